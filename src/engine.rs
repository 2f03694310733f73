use std::collections::HashSet;

use serde::Serialize;

use crate::contribution::{ContributionRow, compose_row, rank_rows};
use crate::corpus::{Corpus, RawMatch, TeamId};
use crate::defense::defense_impact;
use crate::entries::{ScoutEntry, aggregate_entries};
use crate::errors::{EngineError, SkippedMatch};
use crate::lambda_select::{LambdaMode, LambdaSweepRow, SweepConfig, select_lambda};
use crate::opr::{OprConfig, solve_opr};
use crate::options::{EngineOptions, OprMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub selected_lambda: f64,
    pub mode: LambdaMode,
    pub latest_sweep: Vec<LambdaSweepRow>,
    pub train_matches: usize,
    pub holdout_matches: usize,
    pub matches_used: usize,
    pub opr_mode: OprMode,
    pub include_playoffs: bool,
    pub solver_degraded: bool,
    pub skipped_matches: Vec<SkippedMatch>,
    pub skipped_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionReport {
    pub rows: Vec<ContributionRow>,
    pub diagnostics: Diagnostics,
}

impl ContributionReport {
    pub fn row(&self, team: TeamId) -> Option<&ContributionRow> {
        self.rows.iter().find(|r| r.team_id == team)
    }
}

pub fn compute_from_raw(
    raw: &[RawMatch],
    entries: &[ScoutEntry],
    opts: &EngineOptions,
) -> Result<ContributionReport, EngineError> {
    compute_contributions(&Corpus::from_raw(raw), entries, opts)
}

/// Rank every team named in the corpus. Pure: everything is rebuilt from the
/// inputs on each call.
pub fn compute_contributions(
    corpus: &Corpus,
    entries: &[ScoutEntry],
    opts: &EngineOptions,
) -> Result<ContributionReport, EngineError> {
    for skip in corpus.skipped() {
        let err = EngineError::from(skip.clone());
        tracing::warn!("{err}");
    }

    // Shared by the regression and the defense estimator.
    let matches = corpus.eligible(opts.include_playoffs);
    if matches.is_empty() {
        return Err(EngineError::InsufficientData {
            skipped: corpus.skipped().len(),
        });
    }
    let universe = corpus.teams();
    let non_negative = opts.opr_mode.non_negative();

    let selection = select_lambda(
        &matches,
        universe,
        &SweepConfig {
            grid: &opts.lambda_grid,
            train_fraction: opts.train_fraction,
            fallback_lambda: opts.fallback_lambda,
            non_negative,
            fixed_lambda: opts.fixed_lambda,
        },
    );

    let opr = solve_opr(
        &matches,
        universe,
        OprConfig {
            lambda: selection.lambda,
            non_negative,
        },
    )?;
    let defense = defense_impact(&matches, &opr);

    let excluded: HashSet<String> = corpus
        .matches()
        .iter()
        .filter(|m| !opts.include_playoffs && m.is_playoff())
        .map(|m| m.key.clone())
        .collect();
    let aggregates = aggregate_entries(entries, &excluded);

    let mut rows: Vec<ContributionRow> = universe
        .iter()
        .map(|&team| {
            compose_row(
                team,
                opr.get(team),
                &aggregates.get(team),
                defense.get(&team).copied().unwrap_or(0.0),
            )
        })
        .collect();
    rank_rows(&mut rows);

    Ok(ContributionReport {
        rows,
        diagnostics: Diagnostics {
            selected_lambda: opr.lambda,
            mode: selection.mode,
            latest_sweep: selection.sweep,
            train_matches: selection.train_matches,
            holdout_matches: selection.holdout_matches,
            matches_used: matches.len(),
            opr_mode: opts.opr_mode,
            include_playoffs: opts.include_playoffs,
            solver_degraded: opr.degraded,
            skipped_matches: corpus.skipped().to_vec(),
            skipped_entries: aggregates.skipped_entries,
        },
    })
}
