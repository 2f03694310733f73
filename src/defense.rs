//! Defensive suppression credit.
//!
//! For each alliance, the opponents' expected output is the sum of their
//! ratings; anything they score below that is credited to the defending
//! alliance and split equally among its members. The split cannot tell which
//! teammate actually played defense.

use std::collections::BTreeMap;

use crate::corpus::{Alliance, Match, TeamId};
use crate::opr::{OprResult, finite_or_zero};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Samples {
    sum: f64,
    n: u32,
}

/// Mean per-match suppression per team. Must be fed the same match set the
/// ratings were fit on. Teams without samples are absent (read as 0).
pub fn defense_impact(matches: &[Match], opr: &OprResult) -> BTreeMap<TeamId, f64> {
    let mut samples: BTreeMap<TeamId, Samples> = BTreeMap::new();

    for m in matches {
        for alliance in Alliance::BOTH {
            let defenders = m.teams(alliance);
            if defenders.is_empty() {
                continue;
            }
            let opponent = alliance.opponent();
            let expected = opr.predict(m.teams(opponent)).total();
            let actual = m.totals(opponent).total();
            let per_team = (expected - actual) / defenders.len() as f64;
            if !per_team.is_finite() {
                continue;
            }
            for team in defenders {
                let s = samples.entry(*team).or_default();
                s.sum += per_team;
                s.n += 1;
            }
        }
    }

    samples
        .into_iter()
        .filter(|(_, s)| s.n > 0)
        .map(|(team, s)| (team, finite_or_zero(s.sum / s.n as f64)))
        .collect()
}
