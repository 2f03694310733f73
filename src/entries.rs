use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::corpus::TeamId;
use crate::field_probe::{self, first_finite, first_resolved};

/// One scouted record: a single team in a single match. The shape is whatever
/// the scouting export produced; fields are read through probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoutEntry(pub Value);

/// The numbers a single entry contributes, after alias resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryObservation {
    pub auto: Option<f64>,
    pub teleop: Option<f64>,
    pub passes: Option<f64>,
    pub schedule_strength: Option<f64>,
}

impl EntryObservation {
    pub fn has_fuel_data(&self) -> bool {
        self.auto.is_some() || self.teleop.is_some()
    }
}

impl ScoutEntry {
    pub fn team(&self) -> Option<TeamId> {
        first_resolved(&self.0, field_probe::TEAM_FIELDS, TeamId::resolve)
    }

    pub fn match_key(&self) -> Option<&str> {
        first_resolved(&self.0, field_probe::MATCH_FIELDS, |v| {
            v.as_str().map(str::trim).filter(|s| !s.is_empty())
        })
    }

    /// Scaled production wins; raw production is the fallback per phase.
    pub fn observation(&self) -> EntryObservation {
        let rec = &self.0;
        EntryObservation {
            auto: first_finite(rec, field_probe::SCALED_AUTO)
                .or_else(|| first_finite(rec, field_probe::RAW_AUTO)),
            teleop: first_finite(rec, field_probe::SCALED_TELEOP)
                .or_else(|| first_finite(rec, field_probe::RAW_TELEOP)),
            passes: first_finite(rec, field_probe::PASSING),
            schedule_strength: first_finite(rec, field_probe::SCHEDULE_STRENGTH),
        }
    }
}

pub fn parse_entries_json(raw: &str) -> Result<Vec<ScoutEntry>> {
    let value: Value = serde_json::from_str(raw).context("parse scouting entries json")?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(ScoutEntry).collect()),
        other => anyhow::bail!("scouting entries must be a json array, got {}", kind(&other)),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamAggregate {
    pub matches_played: u32,
    pub raw_auto_sum: f64,
    pub raw_teleop_sum: f64,
    pub fuel_data_match_count: u32,
    pub pass_sum: f64,
    pub pass_data_match_count: u32,
    pub schedule_strength_sum: f64,
    pub schedule_strength_count: u32,
}

impl TeamAggregate {
    fn absorb(&mut self, obs: EntryObservation) {
        self.matches_played += 1;
        if obs.has_fuel_data() {
            self.raw_auto_sum += obs.auto.unwrap_or(0.0);
            self.raw_teleop_sum += obs.teleop.unwrap_or(0.0);
            self.fuel_data_match_count += 1;
        }
        if let Some(p) = obs.passes {
            self.pass_sum += p;
            self.pass_data_match_count += 1;
        }
        if let Some(s) = obs.schedule_strength {
            self.schedule_strength_sum += s;
            self.schedule_strength_count += 1;
        }
    }

    pub fn has_fuel_data(&self) -> bool {
        self.fuel_data_match_count > 0
    }

    pub fn auto_avg(&self) -> Option<f64> {
        mean(self.raw_auto_sum, self.fuel_data_match_count)
    }

    pub fn teleop_avg(&self) -> Option<f64> {
        mean(self.raw_teleop_sum, self.fuel_data_match_count)
    }

    pub fn pass_avg(&self) -> Option<f64> {
        mean(self.pass_sum, self.pass_data_match_count)
    }

    pub fn schedule_strength_avg(&self) -> Option<f64> {
        mean(self.schedule_strength_sum, self.schedule_strength_count)
    }
}

fn mean(sum: f64, n: u32) -> Option<f64> {
    if n == 0 {
        return None;
    }
    let v = sum / n as f64;
    v.is_finite().then_some(v)
}

#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub by_team: BTreeMap<TeamId, TeamAggregate>,
    pub skipped_entries: usize,
}

impl Aggregates {
    pub fn get(&self, team: TeamId) -> TeamAggregate {
        self.by_team.get(&team).copied().unwrap_or_default()
    }
}

/// Fold scouted entries into per-team aggregates. Entries tied to a match in
/// `excluded_matches` are ignored so the aggregates follow the same match set
/// as the regression.
pub fn aggregate_entries(entries: &[ScoutEntry], excluded_matches: &HashSet<String>) -> Aggregates {
    let mut out = Aggregates::default();
    for entry in entries {
        let Some(team) = entry.team() else {
            out.skipped_entries += 1;
            continue;
        };
        if entry
            .match_key()
            .is_some_and(|key| excluded_matches.contains(key))
        {
            continue;
        }
        out.by_team
            .entry(team)
            .or_default()
            .absorb(entry.observation());
    }
    if out.skipped_entries > 0 {
        tracing::warn!(
            skipped = out.skipped_entries,
            "scouting entries without a resolvable team were ignored"
        );
    }
    out
}
