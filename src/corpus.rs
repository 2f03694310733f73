use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{MalformedReason, SkippedMatch};
use crate::field_probe::{self, first_finite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl TeamId {
    /// Accepts `"frc254"`, `"254"` or a bare JSON number.
    pub fn resolve(raw: &Value) -> Option<Self> {
        match raw {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).map(TeamId),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let s = s
            .strip_prefix("frc")
            .or_else(|| s.strip_prefix("FRC"))
            .unwrap_or(s);
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        s.parse::<u32>().ok().filter(|n| *n > 0).map(TeamId)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionLevel {
    Qualifying,
    Playoff,
}

impl CompetitionLevel {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()) {
            None => CompetitionLevel::Qualifying,
            Some(c) if c.is_empty() || c == "qm" || c.starts_with("qual") => {
                CompetitionLevel::Qualifying
            }
            Some(_) => CompetitionLevel::Playoff,
        }
    }

    fn rank(self) -> u8 {
        match self {
            CompetitionLevel::Qualifying => 0,
            CompetitionLevel::Playoff => 1,
        }
    }
}

/// Bracket round of a level code: eighths < quarters < semis < finals.
/// Qualifying and unrecognized codes are round 0.
pub fn playoff_round(code: Option<&str>) -> u8 {
    match code.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("ef") => 1,
        Some("qf") => 2,
        Some("sf") => 3,
        Some("f") => 4,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub const BOTH: [Alliance; 2] = [Alliance::Red, Alliance::Blue];

    pub fn opponent(self) -> Self {
        match self {
            Alliance::Red => Alliance::Blue,
            Alliance::Blue => Alliance::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTotals {
    pub auto: f64,
    pub teleop: f64,
}

impl PhaseTotals {
    pub fn new(auto: f64, teleop: f64) -> Self {
        Self { auto, teleop }
    }

    pub fn total(&self) -> f64 {
        self.auto + self.teleop
    }
}

/// A validated match. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub key: String,
    pub level: CompetitionLevel,
    pub round: u8,
    pub time: Option<i64>,
    pub set_number: u32,
    pub match_number: u32,
    pub red: Vec<TeamId>,
    pub blue: Vec<TeamId>,
    pub red_totals: PhaseTotals,
    pub blue_totals: PhaseTotals,
}

impl Match {
    pub fn qualifying(
        key: impl Into<String>,
        red: &[u32],
        blue: &[u32],
        red_totals: PhaseTotals,
        blue_totals: PhaseTotals,
    ) -> Self {
        Self {
            key: key.into(),
            level: CompetitionLevel::Qualifying,
            round: 0,
            time: None,
            set_number: 1,
            match_number: 0,
            red: red.iter().copied().map(TeamId).collect(),
            blue: blue.iter().copied().map(TeamId).collect(),
            red_totals,
            blue_totals,
        }
    }

    pub fn teams(&self, alliance: Alliance) -> &[TeamId] {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }

    pub fn totals(&self, alliance: Alliance) -> PhaseTotals {
        match alliance {
            Alliance::Red => self.red_totals,
            Alliance::Blue => self.blue_totals,
        }
    }

    pub fn is_playoff(&self) -> bool {
        self.level == CompetitionLevel::Playoff
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAlliance {
    #[serde(default, alias = "teamKeys")]
    pub team_keys: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAlliances {
    #[serde(default)]
    pub red: Option<RawAlliance>,
    #[serde(default)]
    pub blue: Option<RawAlliance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBreakdown {
    #[serde(default)]
    pub red: Option<Value>,
    #[serde(default)]
    pub blue: Option<Value>,
}

/// A match record as delivered by the results feed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMatch {
    pub key: String,
    #[serde(default, alias = "compLevel")]
    pub comp_level: Option<String>,
    #[serde(default, alias = "setNumber")]
    pub set_number: Option<u32>,
    #[serde(default, alias = "matchNumber")]
    pub match_number: Option<u32>,
    #[serde(default, alias = "actualTime")]
    pub actual_time: Option<i64>,
    /// Scheduled start; used only when `actual_time` is absent.
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub alliances: RawAlliances,
    #[serde(default, alias = "scoreBreakdown")]
    pub score_breakdown: Option<RawBreakdown>,
}

pub fn parse_matches_json(raw: &str) -> Result<Vec<RawMatch>> {
    let value: Value = serde_json::from_str(raw).context("parse match corpus json")?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value::<Vec<RawMatch>>(value).context("decode match corpus")
}

/// Read-only snapshot of the match corpus, in chronological order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    matches: Vec<Match>,
    skipped: Vec<SkippedMatch>,
    teams: BTreeSet<TeamId>,
}

impl Corpus {
    pub fn from_matches(mut matches: Vec<Match>) -> Self {
        let teams = matches
            .iter()
            .flat_map(|m| m.red.iter().chain(m.blue.iter()).copied())
            .collect();
        sort_chronologically(&mut matches);
        Self {
            matches,
            skipped: Vec::new(),
            teams,
        }
    }

    pub fn from_raw(raw: &[RawMatch]) -> Self {
        let mut matches = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();
        let mut teams = BTreeSet::new();

        for rm in raw {
            // Resolvable teams keep their row even when the match itself is unusable.
            for alliance in rm.alliances.red.iter().chain(rm.alliances.blue.iter()) {
                teams.extend(alliance.team_keys.iter().filter_map(TeamId::resolve));
            }
            match validate_match(rm) {
                Ok(m) => matches.push(m),
                Err(reason) => skipped.push(SkippedMatch {
                    key: rm.key.clone(),
                    reason,
                }),
            }
        }

        sort_chronologically(&mut matches);
        Self {
            matches,
            skipped,
            teams,
        }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn skipped(&self) -> &[SkippedMatch] {
        &self.skipped
    }

    /// Every team named in any alliance of the input, usable or not.
    pub fn teams(&self) -> &BTreeSet<TeamId> {
        &self.teams
    }

    /// The match set shared by the regression and the defense estimator.
    pub fn eligible(&self, include_playoffs: bool) -> Vec<Match> {
        self.matches
            .iter()
            .filter(|m| include_playoffs || !m.is_playoff())
            .cloned()
            .collect()
    }
}

fn validate_match(rm: &RawMatch) -> Result<Match, MalformedReason> {
    let red = resolve_alliance(rm.alliances.red.as_ref())?;
    let blue = resolve_alliance(rm.alliances.blue.as_ref())?;

    let breakdown = rm
        .score_breakdown
        .as_ref()
        .ok_or(MalformedReason::MissingScore)?;
    let red_totals = phase_totals(breakdown.red.as_ref())?;
    let blue_totals = phase_totals(breakdown.blue.as_ref())?;

    Ok(Match {
        key: rm.key.clone(),
        level: CompetitionLevel::from_code(rm.comp_level.as_deref()),
        round: playoff_round(rm.comp_level.as_deref()),
        time: rm.actual_time.or(rm.time),
        set_number: rm.set_number.unwrap_or(1),
        match_number: rm.match_number.unwrap_or(0),
        red,
        blue,
        red_totals,
        blue_totals,
    })
}

fn resolve_alliance(alliance: Option<&RawAlliance>) -> Result<Vec<TeamId>, MalformedReason> {
    let Some(alliance) = alliance else {
        return Err(MalformedReason::EmptyAlliance);
    };
    if alliance.team_keys.is_empty() {
        return Err(MalformedReason::EmptyAlliance);
    }
    let mut out = Vec::with_capacity(alliance.team_keys.len());
    for raw in &alliance.team_keys {
        let team = TeamId::resolve(raw)
            .ok_or_else(|| MalformedReason::UnresolvableTeam(raw.to_string()))?;
        if !out.contains(&team) {
            out.push(team);
        }
    }
    Ok(out)
}

fn phase_totals(side: Option<&Value>) -> Result<PhaseTotals, MalformedReason> {
    let side = side.ok_or(MalformedReason::MissingScore)?;
    let auto = first_finite(side, field_probe::AUTO_TOTAL).ok_or(MalformedReason::MissingScore)?;
    let teleop =
        first_finite(side, field_probe::TELEOP_TOTAL).ok_or(MalformedReason::MissingScore)?;
    Ok(PhaseTotals::new(auto, teleop))
}

fn sort_chronologically(matches: &mut [Match]) {
    let all_timed = !matches.is_empty() && matches.iter().all(|m| m.time.is_some());
    if all_timed {
        matches.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.key.cmp(&b.key)));
    } else {
        // Stable: duplicate keys keep their input order.
        matches.sort_by(|a, b| {
            a.level
                .rank()
                .cmp(&b.level.rank())
                .then(a.round.cmp(&b.round))
                .then(a.set_number.cmp(&b.set_number))
                .then(a.match_number.cmp(&b.match_number))
                .then_with(|| a.key.cmp(&b.key))
        });
    }
}
