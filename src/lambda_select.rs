use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::corpus::{Alliance, Match, TeamId};
use crate::errors::EngineError;
use crate::opr::{OprConfig, OprResult, solve_opr};

pub const DEFAULT_LAMBDA_GRID: [f64; 11] =
    [0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0];
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
/// Used when there is nothing to validate against; deliberately on the
/// heavy-shrinkage side of the grid.
pub const FALLBACK_LAMBDA: f64 = 20.0;
const MIN_SWEEP_MATCHES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LambdaMode {
    Holdout,
    InsufficientHoldout,
    Fixed,
}

impl LambdaMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LambdaMode::Holdout => "holdout",
            LambdaMode::InsufficientHoldout => "insufficient-holdout",
            LambdaMode::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LambdaSweepRow {
    pub lambda: f64,
    pub holdout_rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaSelection {
    pub lambda: f64,
    pub mode: LambdaMode,
    pub sweep: Vec<LambdaSweepRow>,
    pub train_matches: usize,
    pub holdout_matches: usize,
}

#[derive(Debug, Clone)]
pub struct SweepConfig<'a> {
    pub grid: &'a [f64],
    pub train_fraction: f64,
    pub fallback_lambda: f64,
    pub non_negative: bool,
    pub fixed_lambda: Option<f64>,
}

impl Default for SweepConfig<'_> {
    fn default() -> Self {
        Self {
            grid: &DEFAULT_LAMBDA_GRID,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            fallback_lambda: FALLBACK_LAMBDA,
            non_negative: false,
            fixed_lambda: None,
        }
    }
}

/// Index of the first holdout match. Equal to `n` when the corpus is too small
/// to hold anything out.
pub fn split_train_index(n: usize, train_fraction: f64) -> usize {
    if n < MIN_SWEEP_MATCHES {
        return n;
    }
    let frac = if train_fraction.is_finite() {
        train_fraction.clamp(0.0, 1.0)
    } else {
        DEFAULT_TRAIN_FRACTION
    };
    let idx = ((n as f64) * frac).round() as usize;
    idx.clamp(1, n - 1)
}

/// RMSE of predicted vs. observed alliance totals (auto + teleop), one sample
/// per alliance per match.
pub fn holdout_rmse(fit: &OprResult, holdout: &[Match]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for m in holdout {
        for alliance in Alliance::BOTH {
            let predicted = fit.predict(m.teams(alliance)).total();
            let actual = m.totals(alliance).total();
            let err = predicted - actual;
            sum += err * err;
            n += 1;
        }
    }
    if n == 0 {
        return f64::INFINITY;
    }
    (sum / n as f64).sqrt()
}

/// Sweep the grid over a chronological train/holdout split and pick the λ
/// with the lowest holdout RMSE. Ties keep the earliest grid entry.
pub fn select_lambda(
    matches: &[Match],
    universe: &BTreeSet<TeamId>,
    cfg: &SweepConfig<'_>,
) -> LambdaSelection {
    let mut grid: Vec<f64> = cfg
        .grid
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l > 0.0)
        .collect();
    if grid.is_empty() {
        grid = DEFAULT_LAMBDA_GRID.to_vec();
    }

    let split = split_train_index(matches.len(), cfg.train_fraction);
    let (train, holdout) = matches.split_at(split);

    let mut selection = if holdout.is_empty() || train.is_empty() {
        tracing::warn!(
            "{}; falling back to lambda={}",
            EngineError::InsufficientHoldout {
                matches: matches.len()
            },
            cfg.fallback_lambda
        );
        LambdaSelection {
            lambda: cfg.fallback_lambda,
            mode: LambdaMode::InsufficientHoldout,
            sweep: Vec::new(),
            train_matches: train.len(),
            holdout_matches: 0,
        }
    } else {
        let sweep: Vec<LambdaSweepRow> = grid
            .par_iter()
            .map(|&lambda| {
                let opr_cfg = OprConfig {
                    lambda,
                    non_negative: cfg.non_negative,
                };
                let rmse = match solve_opr(train, universe, opr_cfg) {
                    Ok(fit) => holdout_rmse(&fit, holdout),
                    Err(_) => f64::INFINITY,
                };
                LambdaSweepRow {
                    lambda,
                    holdout_rmse: rmse,
                }
            })
            .collect();

        let best = sweep
            .iter()
            .filter(|row| row.holdout_rmse.is_finite())
            .fold(None::<LambdaSweepRow>, |best, row| match best {
                Some(b) if b.holdout_rmse <= row.holdout_rmse => Some(b),
                _ => Some(*row),
            });

        match best {
            Some(row) => LambdaSelection {
                lambda: row.lambda,
                mode: LambdaMode::Holdout,
                sweep,
                train_matches: train.len(),
                holdout_matches: holdout.len(),
            },
            None => LambdaSelection {
                lambda: cfg.fallback_lambda,
                mode: LambdaMode::InsufficientHoldout,
                sweep,
                train_matches: train.len(),
                holdout_matches: holdout.len(),
            },
        }
    };

    if let Some(fixed) = cfg.fixed_lambda.filter(|l| l.is_finite() && *l > 0.0) {
        selection.lambda = fixed;
        selection.mode = LambdaMode::Fixed;
    }

    tracing::debug!(
        lambda = selection.lambda,
        mode = selection.mode.as_str(),
        train = selection.train_matches,
        holdout = selection.holdout_matches,
        "lambda selected"
    );
    selection
}
