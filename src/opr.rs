//! Ridge-regularized offensive power ratings.
//!
//! Only alliance totals are observed, so every alliance appearance is a row
//! `sum(x_team for team in alliance) = observed_total`. Each phase is solved
//! independently through the normal equations `(AᵀA + λI) x = Aᵀb` and the
//! phase ratings are summed into `total_opr`; this is not a joint fit.
//!
//! Non-negative ("production") mode clamps negative components to zero after
//! the solve instead of re-solving under inequality constraints. The clamp is
//! an approximation: the remaining components are not re-fit.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::corpus::{Alliance, Match, PhaseTotals, TeamId};
use crate::errors::EngineError;

/// Ridge strength floor; the unregularized system is singular whenever two
/// teams always share an alliance.
pub const MIN_LAMBDA: f64 = 1e-9;
const EIGEN_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct OprConfig {
    pub lambda: f64,
    pub non_negative: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamOpr {
    pub auto_opr: f64,
    pub teleop_opr: f64,
    pub total_opr: f64,
    pub matches_played: u32,
}

#[derive(Debug, Clone, Default)]
pub struct OprResult {
    pub lambda: f64,
    pub non_negative: bool,
    /// True when Cholesky rejected the system and the eigen fallback ran.
    pub degraded: bool,
    pub by_team: BTreeMap<TeamId, TeamOpr>,
}

impl OprResult {
    pub fn get(&self, team: TeamId) -> TeamOpr {
        self.by_team.get(&team).copied().unwrap_or_default()
    }

    /// Predicted alliance output: the sum of member ratings per phase.
    pub fn predict(&self, teams: &[TeamId]) -> PhaseTotals {
        teams.iter().fold(PhaseTotals::default(), |acc, t| {
            let r = self.get(*t);
            PhaseTotals::new(acc.auto + r.auto_opr, acc.teleop + r.teleop_opr)
        })
    }

    /// Euclidean norm over both phase vectors.
    pub fn norm(&self) -> f64 {
        self.by_team
            .values()
            .map(|r| r.auto_opr * r.auto_opr + r.teleop_opr * r.teleop_opr)
            .sum::<f64>()
            .sqrt()
    }
}

/// Normal equations for both phases, sharing one Gram matrix.
struct NormalEquations {
    index: BTreeMap<TeamId, usize>,
    gram: DMatrix<f64>,
    rhs_auto: DVector<f64>,
    rhs_teleop: DVector<f64>,
    appearances: Vec<u32>,
}

impl NormalEquations {
    fn build(matches: &[Match], universe: &BTreeSet<TeamId>) -> Self {
        let mut teams: BTreeSet<TeamId> = universe.clone();
        for m in matches {
            teams.extend(m.red.iter().chain(m.blue.iter()).copied());
        }
        let index: BTreeMap<TeamId, usize> =
            teams.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
        let n = index.len();

        let mut gram = DMatrix::<f64>::zeros(n, n);
        let mut rhs_auto = DVector::<f64>::zeros(n);
        let mut rhs_teleop = DVector::<f64>::zeros(n);
        let mut appearances = vec![0u32; n];

        for m in matches {
            for alliance in Alliance::BOTH {
                let cols: Vec<usize> = m
                    .teams(alliance)
                    .iter()
                    .filter_map(|t| index.get(t).copied())
                    .collect();
                let totals = m.totals(alliance);
                for &i in &cols {
                    for &j in &cols {
                        gram[(i, j)] += 1.0;
                    }
                    rhs_auto[i] += totals.auto;
                    rhs_teleop[i] += totals.teleop;
                    appearances[i] += 1;
                }
            }
        }

        Self {
            index,
            gram,
            rhs_auto,
            rhs_teleop,
            appearances,
        }
    }

    /// Solve both phases; the flag reports whether the eigen fallback ran.
    fn solve(&self, lambda: f64) -> (DVector<f64>, DVector<f64>, bool) {
        let n = self.index.len();
        let mut system = self.gram.clone();
        for d in 0..n {
            system[(d, d)] += lambda;
        }

        if let Some(chol) = Cholesky::new(system.clone()) {
            return (chol.solve(&self.rhs_auto), chol.solve(&self.rhs_teleop), false);
        }

        tracing::warn!(lambda, teams = n, "cholesky rejected ridge system, using eigen fallback");
        let eig = SymmetricEigen::new(system);
        let inv = eig.eigenvalues.map(|v| {
            if v.abs() <= EIGEN_FLOOR {
                0.0
            } else {
                1.0 / v
            }
        });
        let apply = |rhs: &DVector<f64>| {
            let vt_rhs = eig.eigenvectors.transpose() * rhs;
            &eig.eigenvectors * inv.component_mul(&vt_rhs)
        };
        (apply(&self.rhs_auto), apply(&self.rhs_teleop), true)
    }
}

/// Fit per-team ratings on `matches`. Every team in `universe` gets an entry;
/// teams without appearances land on 0 because the ridge term pulls an empty
/// column to zero.
pub fn solve_opr(
    matches: &[Match],
    universe: &BTreeSet<TeamId>,
    cfg: OprConfig,
) -> Result<OprResult, EngineError> {
    if matches.is_empty() {
        return Err(EngineError::InsufficientData { skipped: 0 });
    }
    let lambda = if cfg.lambda.is_finite() {
        cfg.lambda.max(MIN_LAMBDA)
    } else {
        MIN_LAMBDA
    };

    let eq = NormalEquations::build(matches, universe);
    let (auto, teleop, degraded) = eq.solve(lambda);

    let mut by_team = BTreeMap::new();
    for (&team, &i) in &eq.index {
        let mut auto_opr = finite_or_zero(auto[i]);
        let mut teleop_opr = finite_or_zero(teleop[i]);
        if cfg.non_negative {
            auto_opr = auto_opr.max(0.0);
            teleop_opr = teleop_opr.max(0.0);
        }
        by_team.insert(
            team,
            TeamOpr {
                auto_opr,
                teleop_opr,
                total_opr: auto_opr + teleop_opr,
                matches_played: eq.appearances[i],
            },
        );
    }

    Ok(OprResult {
        lambda,
        non_negative: cfg.non_negative,
        degraded,
        by_team,
    })
}

pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}
