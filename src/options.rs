use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::lambda_select::{DEFAULT_LAMBDA_GRID, DEFAULT_TRAIN_FRACTION, FALLBACK_LAMBDA};

/// `Impact` lets ratings go negative; `Production` clamps them at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OprMode {
    Impact,
    #[default]
    Production,
}

impl OprMode {
    pub fn non_negative(self) -> bool {
        matches!(self, OprMode::Production)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "impact" => Some(OprMode::Impact),
            "production" | "prod" => Some(OprMode::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub include_playoffs: bool,
    pub opr_mode: OprMode,
    /// Skip holdout selection and use this λ.
    pub fixed_lambda: Option<f64>,
    pub lambda_grid: Vec<f64>,
    pub train_fraction: f64,
    pub fallback_lambda: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            include_playoffs: false,
            opr_mode: OprMode::default(),
            fixed_lambda: None,
            lambda_grid: DEFAULT_LAMBDA_GRID.to_vec(),
            train_fraction: DEFAULT_TRAIN_FRACTION,
            fallback_lambda: FALLBACK_LAMBDA,
        }
    }
}

impl EngineOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read engine options {}", path.display()))?;
        serde_json::from_str::<EngineOptions>(&raw)
            .with_context(|| format!("parse engine options {}", path.display()))
    }

    /// Override fields from `CONTRIB_*` environment variables. Unparseable
    /// values are ignored.
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = env_flag("CONTRIB_INCLUDE_PLAYOFFS") {
            self.include_playoffs = v;
        }
        if let Some(mode) = env::var("CONTRIB_OPR_MODE")
            .ok()
            .and_then(|raw| OprMode::parse(&raw))
        {
            self.opr_mode = mode;
        }
        if let Some(lambda) = env_f64("CONTRIB_LAMBDA").filter(|l| *l > 0.0) {
            self.fixed_lambda = Some(lambda);
        }
        if let Some(frac) = env_f64("CONTRIB_TRAIN_FRACTION").filter(|f| *f > 0.0 && *f < 1.0) {
            self.train_fraction = frac;
        }
        self
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let opts: EngineOptions =
            serde_json::from_str(r#"{"opr_mode":"impact","include_playoffs":true}"#).unwrap();
        assert_eq!(opts.opr_mode, OprMode::Impact);
        assert!(opts.include_playoffs);
        assert_eq!(opts.lambda_grid, DEFAULT_LAMBDA_GRID.to_vec());
        assert_eq!(opts.fixed_lambda, None);
    }

    #[test]
    fn mode_parse() {
        assert_eq!(OprMode::parse(" Impact "), Some(OprMode::Impact));
        assert_eq!(OprMode::parse("prod"), Some(OprMode::Production));
        assert_eq!(OprMode::parse("joint"), None);
        assert!(OprMode::Production.non_negative());
        assert!(!OprMode::Impact.non_negative());
    }
}
