use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use contrib_index::corpus::{Corpus, parse_matches_json};
use contrib_index::engine::{ContributionReport, compute_contributions};
use contrib_index::entries::{ScoutEntry, parse_entries_json};
use contrib_index::options::{EngineOptions, OprMode};

const DEFAULT_TOP: usize = 30;

#[derive(Debug, Serialize)]
struct ReportArtifact<'a> {
    generated_at: String,
    matches_path: String,
    entries_path: Option<String>,
    #[serde(flatten)]
    report: &'a ContributionReport,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches_path = parse_path_arg("--matches")
        .or_else(|| std::env::var("CONTRIB_MATCHES_PATH").ok().map(PathBuf::from))
        .context("missing --matches <path>")?;
    let entries_path =
        parse_path_arg("--entries").or_else(|| std::env::var("CONTRIB_ENTRIES_PATH").ok().map(PathBuf::from));

    let mut opts = match parse_path_arg("--options") {
        Some(path) => EngineOptions::load(&path)?,
        None => EngineOptions::default(),
    }
    .apply_env();
    if has_flag("--include-playoffs") {
        opts.include_playoffs = true;
    }
    if let Some(raw) = parse_str_arg("--mode") {
        opts.opr_mode = OprMode::parse(&raw).ok_or_else(|| anyhow!("unknown --mode {raw:?}"))?;
    }
    if let Some(lambda) = parse_f64_arg("--lambda") {
        opts.fixed_lambda = Some(lambda);
    }
    let top = parse_usize_arg("--top").unwrap_or(DEFAULT_TOP);

    let raw = fs::read_to_string(&matches_path)
        .with_context(|| format!("read matches {}", matches_path.display()))?;
    let corpus = Corpus::from_raw(&parse_matches_json(&raw)?);
    let entries = match &entries_path {
        Some(path) => load_entries(path)?,
        None => Vec::new(),
    };

    let report = compute_contributions(&corpus, &entries, &opts)
        .with_context(|| format!("rank teams from {}", matches_path.display()))?;

    print_report(&report, top);

    if let Some(out_path) = parse_path_arg("--out") {
        let artifact = ReportArtifact {
            generated_at: chrono::Utc::now().to_rfc3339(),
            matches_path: matches_path.display().to_string(),
            entries_path: entries_path.as_ref().map(|p| p.display().to_string()),
            report: &report,
        };
        write_json(&out_path, &artifact)?;
        println!();
        println!("report written: {}", out_path.display());
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(value).context("serialize report")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))
}

fn load_entries(path: &Path) -> Result<Vec<ScoutEntry>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read entries {}", path.display()))?;
    parse_entries_json(&raw).with_context(|| format!("parse entries {}", path.display()))
}

fn print_report(report: &ContributionReport, top: usize) {
    let d = &report.diagnostics;
    println!(
        "lambda={:.3} mode={} opr_mode={:?} matches={} (train={} holdout={}) skipped_matches={} skipped_entries={}",
        d.selected_lambda,
        d.mode.as_str(),
        d.opr_mode,
        d.matches_used,
        d.train_matches,
        d.holdout_matches,
        d.skipped_matches.len(),
        d.skipped_entries,
    );
    for skip in &d.skipped_matches {
        println!("  skipped {}: {}", skip.key, skip.reason);
    }
    println!();
    println!(
        "{:>4} {:>6} {:>3} {:>7} {:>7} {:>7} {:>7} {:>5} {:>7} {:>6} {:>6} {:>7}",
        "#", "team", "mp", "autoOPR", "teleOPR", "OPR", "scaled", "conf", "hybrid", "assist", "def", "index"
    );
    for (idx, row) in report.rows.iter().take(top).enumerate() {
        println!(
            "{:>4} {:>6} {:>3} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>5.2} {:>7.2} {:>6.2} {:>6.2} {:>7.2}",
            idx + 1,
            row.team_id,
            row.matches_played,
            row.auto_opr,
            row.teleop_opr,
            row.total_opr,
            row.scaled_total_avg,
            row.confidence_score,
            row.hybrid_scorer_index,
            row.assist_impact,
            row.defense_impact,
            row.total_contribution_index,
        );
    }
    if report.rows.len() > top {
        println!("  ... {} more", report.rows.len() - top);
    }
}

fn parse_str_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            return Some(v.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_str_arg(name).map(PathBuf::from)
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_str_arg(name)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_str_arg(name).and_then(|v| v.parse::<usize>().ok())
}

fn has_flag(flag: &str) -> bool {
    std::env::args().skip(1).any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_dir_failure_names_the_directory() {
        let base = std::env::temp_dir().join(format!("contrib_index_out_{}", std::process::id()));
        fs::create_dir_all(&base).unwrap();
        let blocker = base.join("not_a_dir");
        fs::write(&blocker, "x").unwrap();

        let err = write_json(&blocker.join("report.json"), &serde_json::json!({"rows": []}))
            .unwrap_err();
        assert!(format!("{err:#}").contains("create report dir"), "{err:#}");

        let ok_path = base.join("nested").join("report.json");
        write_json(&ok_path, &serde_json::json!({"rows": []})).unwrap();
        assert!(ok_path.exists());
        fs::remove_dir_all(&base).ok();
    }
}
