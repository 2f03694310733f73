use std::cmp::Ordering;

use serde::Serialize;

use crate::corpus::TeamId;
use crate::entries::TeamAggregate;
use crate::opr::{TeamOpr, finite_or_zero};

/// Sample size at which the under-sampling penalty reaches zero.
pub const TARGET_MATCHES: f64 = 6.0;
const SOS_SCALE: f64 = 6.0;
pub const MISSING_SCALED_PENALTY: f64 = 0.6;

const W_MATCH: f64 = 0.35;
const W_GAP: f64 = 0.25;
const W_SOS: f64 = 0.15;
const W_MISSING: f64 = 0.25;

const SCALED_BLEND: f64 = 0.6;
const OPR_BLEND: f64 = 0.4;
const ASSIST_WEIGHT: f64 = 0.2;
const DEFENSE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionRow {
    pub team_id: TeamId,
    pub matches_played: u32,
    pub auto_opr: f64,
    pub teleop_opr: f64,
    pub total_opr: f64,
    pub scaled_auto_avg: f64,
    pub scaled_teleop_avg: f64,
    pub scaled_total_avg: f64,
    pub confidence_score: f64,
    pub confidence_penalty: f64,
    pub schedule_strength_penalty: f64,
    pub hybrid_scorer_index: f64,
    pub assist_impact: f64,
    pub defense_impact: f64,
    pub total_contribution_index: f64,
    #[serde(skip_serializing)]
    pub has_scaled_fuel_data: bool,
}

/// Every term of the confidence penalty, before weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBreakdown {
    pub match_penalty: f64,
    pub gap_penalty: f64,
    pub sos_penalty: f64,
    pub missing_scaled_penalty: f64,
    pub confidence_penalty: f64,
    pub confidence_score: f64,
}

pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Schedule strength only dampens confidence; it never adds merit.
pub fn confidence(
    matches_played: u32,
    total_opr: f64,
    scaled_total_avg: Option<f64>,
    schedule_strength_avg: Option<f64>,
) -> ConfidenceBreakdown {
    let match_penalty = ((TARGET_MATCHES - matches_played as f64) / TARGET_MATCHES).max(0.0);

    let gap_penalty = match scaled_total_avg {
        Some(scaled) => {
            let denom = 1.0_f64.max(total_opr.abs()).max(scaled.abs());
            clamp01((total_opr - scaled).abs() / denom)
        }
        None => 0.0,
    };

    let sos_penalty = schedule_strength_avg
        .map(|s| clamp01(s / SOS_SCALE))
        .unwrap_or(0.0);

    let missing_scaled_penalty = if scaled_total_avg.is_some() {
        0.0
    } else {
        MISSING_SCALED_PENALTY
    };

    let confidence_penalty = clamp01(
        W_MATCH * match_penalty
            + W_GAP * gap_penalty
            + W_SOS * sos_penalty
            + W_MISSING * missing_scaled_penalty,
    );

    ConfidenceBreakdown {
        match_penalty,
        gap_penalty,
        sos_penalty,
        missing_scaled_penalty,
        confidence_penalty,
        confidence_score: 1.0 - confidence_penalty,
    }
}

pub fn compose_row(
    team_id: TeamId,
    opr: TeamOpr,
    agg: &TeamAggregate,
    defense_impact: f64,
) -> ContributionRow {
    let auto_opr = finite_or_zero(opr.auto_opr);
    let teleop_opr = finite_or_zero(opr.teleop_opr);
    let total_opr = finite_or_zero(opr.total_opr);

    let has_scaled_fuel_data = agg.has_fuel_data();
    let (scaled_auto_avg, scaled_teleop_avg) = if has_scaled_fuel_data {
        (
            agg.auto_avg().unwrap_or(0.0),
            agg.teleop_avg().unwrap_or(0.0),
        )
    } else {
        (0.0, 0.0)
    };
    let scaled_total_avg = scaled_auto_avg + scaled_teleop_avg;
    let scaled = has_scaled_fuel_data.then_some(scaled_total_avg);

    let conf = confidence(
        opr.matches_played,
        total_opr,
        scaled,
        agg.schedule_strength_avg(),
    );

    let hybrid_scorer_index = finite_or_zero(match scaled {
        Some(s) => conf.confidence_score * (SCALED_BLEND * s + OPR_BLEND * total_opr),
        None => conf.confidence_score * total_opr,
    });
    let assist_impact = finite_or_zero(agg.pass_avg().unwrap_or(0.0));
    let defense_impact = finite_or_zero(defense_impact);
    let total_contribution_index = finite_or_zero(
        hybrid_scorer_index + ASSIST_WEIGHT * assist_impact + DEFENSE_WEIGHT * defense_impact,
    );

    ContributionRow {
        team_id,
        matches_played: opr.matches_played,
        auto_opr,
        teleop_opr,
        total_opr,
        scaled_auto_avg,
        scaled_teleop_avg,
        scaled_total_avg,
        confidence_score: conf.confidence_score,
        confidence_penalty: conf.confidence_penalty,
        schedule_strength_penalty: conf.sos_penalty,
        hybrid_scorer_index,
        assist_impact,
        defense_impact,
        total_contribution_index,
        has_scaled_fuel_data,
    }
}

/// Total order: index desc, hybrid desc, team id asc.
pub fn rank_order(a: &ContributionRow, b: &ContributionRow) -> Ordering {
    b.total_contribution_index
        .total_cmp(&a.total_contribution_index)
        .then_with(|| b.hybrid_scorer_index.total_cmp(&a.hybrid_scorer_index))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

pub fn rank_rows(rows: &mut [ContributionRow]) {
    rows.sort_by(rank_order);
}
