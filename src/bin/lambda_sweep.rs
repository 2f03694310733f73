use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use contrib_index::corpus::{Corpus, parse_matches_json};
use contrib_index::lambda_select::{SweepConfig, select_lambda};
use contrib_index::options::EngineOptions;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: lambda_sweep <matches.json>"))?;
    let opts = EngineOptions::default().apply_env();

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let corpus = Corpus::from_raw(&parse_matches_json(&raw)?);
    let matches = corpus.eligible(opts.include_playoffs);
    if matches.is_empty() {
        return Err(anyhow!("no usable matches in {}", path.display()));
    }

    let selection = select_lambda(
        &matches,
        corpus.teams(),
        &SweepConfig {
            grid: &opts.lambda_grid,
            train_fraction: opts.train_fraction,
            fallback_lambda: opts.fallback_lambda,
            non_negative: opts.opr_mode.non_negative(),
            fixed_lambda: None,
        },
    );

    println!(
        "matches={} train={} holdout={} skipped={}",
        matches.len(),
        selection.train_matches,
        selection.holdout_matches,
        corpus.skipped().len()
    );
    for row in &selection.sweep {
        let marker = if row.lambda == selection.lambda { "*" } else { " " };
        println!("{marker} lambda={:>8.3} holdout_rmse={:.4}", row.lambda, row.holdout_rmse);
    }
    println!("selected lambda={:.3} mode={}", selection.lambda, selection.mode.as_str());
    Ok(())
}
