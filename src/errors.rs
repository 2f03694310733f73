use serde::Serialize;

/// Engine errors. Only `InsufficientData` is ever returned to the caller;
/// the other variants describe degradations that are recorded in the report
/// diagnostics instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no usable matches to fit ({skipped} skipped)")]
    InsufficientData { skipped: usize },

    #[error("holdout split is empty for {matches} matches")]
    InsufficientHoldout { matches: usize },

    #[error("match {key} skipped: {reason}")]
    MalformedMatch { key: String, reason: MalformedReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    UnresolvableTeam(String),
    EmptyAlliance,
    MissingScore,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::UnresolvableTeam(raw) => write!(f, "unresolvable team key {raw:?}"),
            MalformedReason::EmptyAlliance => write!(f, "alliance has no teams"),
            MalformedReason::MissingScore => write!(f, "missing phase score fields"),
        }
    }
}

/// A match dropped from the design matrix, kept so the skip is observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMatch {
    pub key: String,
    pub reason: MalformedReason,
}

impl From<SkippedMatch> for EngineError {
    fn from(skip: SkippedMatch) -> Self {
        EngineError::MalformedMatch {
            key: skip.key,
            reason: skip.reason,
        }
    }
}
