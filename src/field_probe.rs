//! Tolerant numeric extraction from loosely-shaped JSON records.
//!
//! Scouting exports and score breakdowns have been renamed several times, so
//! every field is described as an ordered list of probes. The first probe that
//! yields a finite number wins; everything else about the record is ignored.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// JSON numbers only.
    Number,
    /// JSON numbers, or strings such as `"12"` / `"1,204"`.
    NumericText,
    /// Length of a JSON array.
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub path: &'static [&'static str],
    pub coercion: Coercion,
}

impl Probe {
    pub const fn number(path: &'static [&'static str]) -> Self {
        Self {
            path,
            coercion: Coercion::Number,
        }
    }

    pub const fn text(path: &'static [&'static str]) -> Self {
        Self {
            path,
            coercion: Coercion::NumericText,
        }
    }

    pub const fn count(path: &'static [&'static str]) -> Self {
        Self {
            path,
            coercion: Coercion::Count,
        }
    }

    pub fn extract(&self, record: &Value) -> Option<f64> {
        let value = lookup(record, self.path)?;
        let out = match self.coercion {
            Coercion::Number => value.as_f64(),
            Coercion::NumericText => match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_number(s),
                _ => None,
            },
            Coercion::Count => value.as_array().map(|items| items.len() as f64),
        }?;
        out.is_finite().then_some(out)
    }
}

pub fn first_finite(record: &Value, probes: &[Probe]) -> Option<f64> {
    probes.iter().find_map(|probe| probe.extract(record))
}

/// First alias whose value `resolve` accepts; unusable values fall through to
/// the next alias.
pub fn first_resolved<'a, T>(
    record: &'a Value,
    paths: &[&[&str]],
    resolve: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    paths
        .iter()
        .find_map(|path| lookup(record, path).and_then(&resolve))
}

fn lookup<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = record;
    for segment in path {
        cur = cur.as_object()?.get(*segment)?;
    }
    Some(cur)
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    // Strip common decorations.
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == ',')
        .collect();
    let cleaned = cleaned.replace(',', "");
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub const AUTO_TOTAL: &[Probe] = &[
    Probe::text(&["autoTotal"]),
    Probe::text(&["auto_total"]),
    Probe::text(&["autoPoints"]),
    Probe::text(&["totalAutoPoints"]),
];

pub const TELEOP_TOTAL: &[Probe] = &[
    Probe::text(&["teleopTotal"]),
    Probe::text(&["teleop_total"]),
    Probe::text(&["teleopPoints"]),
    Probe::text(&["totalTeleopPoints"]),
];

pub const TEAM_FIELDS: &[&[&str]] = &[
    &["team"],
    &["teamNumber"],
    &["team_number"],
    &["teamKey"],
    &["team_key"],
];

pub const MATCH_FIELDS: &[&[&str]] = &[&["matchKey"], &["match_key"], &["match"]];

pub const SCALED_AUTO: &[Probe] = &[
    Probe::text(&["scaledAutoFuel"]),
    Probe::text(&["autoFuelScaled"]),
    Probe::text(&["scaled", "auto"]),
];

pub const RAW_AUTO: &[Probe] = &[
    Probe::text(&["autoFuel"]),
    Probe::text(&["autoFuelScored"]),
    Probe::text(&["auto", "fuel"]),
    Probe::text(&["autoPoints"]),
];

pub const SCALED_TELEOP: &[Probe] = &[
    Probe::text(&["scaledTeleopFuel"]),
    Probe::text(&["teleopFuelScaled"]),
    Probe::text(&["scaled", "teleop"]),
];

pub const RAW_TELEOP: &[Probe] = &[
    Probe::text(&["teleopFuel"]),
    Probe::text(&["teleopFuelScored"]),
    Probe::text(&["teleop", "fuel"]),
    Probe::text(&["teleopPoints"]),
];

pub const PASSING: &[Probe] = &[
    Probe::text(&["passes"]),
    Probe::text(&["passCount"]),
    Probe::text(&["teleopPasses"]),
    Probe::text(&["fuelPassed"]),
    Probe::text(&["passing", "count"]),
    Probe::count(&["passes"]),
];

pub const SCHEDULE_STRENGTH: &[Probe] = &[
    Probe::number(&["opponentSos"]),
    Probe::number(&["scheduleStrength"]),
    Probe::number(&["sos"]),
    Probe::text(&["strengthOfSchedule"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_probe_with_finite_value_wins() {
        let rec = json!({"autoFuel": "n/a", "auto": {"fuel": 7}, "autoPoints": 9});
        assert_eq!(first_finite(&rec, RAW_AUTO), Some(7.0));
    }

    #[test]
    fn scaled_nested_path_is_read() {
        let rec = json!({"scaled": {"auto": 4.5, "teleop": "12"}});
        assert_eq!(first_finite(&rec, SCALED_AUTO), Some(4.5));
        assert_eq!(first_finite(&rec, SCALED_TELEOP), Some(12.0));
    }

    #[test]
    fn pass_array_counts_when_no_number() {
        let rec = json!({"passes": [{"t": 1}, {"t": 2}, {"t": 3}]});
        assert_eq!(first_finite(&rec, PASSING), Some(3.0));
    }

    #[test]
    fn parse_number_strips_decorations() {
        assert_eq!(parse_number(" 1,204 "), Some(1204.0));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn number_coercion_rejects_strings() {
        let rec = json!({"opponentSos": "3.0", "sos": 2.5});
        assert_eq!(first_finite(&rec, SCHEDULE_STRENGTH), Some(2.5));
    }

    #[test]
    fn unusable_alias_falls_through_to_next() {
        let rec = json!({"team": "", "teamNumber": 254});
        let found = first_resolved(&rec, TEAM_FIELDS, |v| v.as_u64());
        assert_eq!(found, Some(254));

        let rec = json!({"matchKey": null, "match_key": 12, "match": "ev_qm3"});
        assert_eq!(first_resolved(&rec, MATCH_FIELDS, Value::as_str), Some("ev_qm3"));
    }
}
