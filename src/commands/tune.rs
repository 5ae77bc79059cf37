use std::io::{self, Write};
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::TuneArgs;
use crate::commands::{CachePaths, write_json_stdout};
use crate::evaluation::{EvaluationContext, load_cases};
use crate::gold;
use crate::index::SqliteIndex;
use crate::tuning::{Grid, SearchOptions, SearchOutcome, search};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};
use crate::weights::{ApplyOutcome, ApplyRequest, ConfigStore};

#[derive(Debug, Serialize)]
struct TuneReport<'a> {
    generated_at: String,
    grid: &'a Grid,
    outcome: &'a SearchOutcome,
    apply: Option<&'a ApplyOutcome>,
}

pub fn run(args: TuneArgs) -> Result<()> {
    let paths = CachePaths::from_store(&args.store).with_dataset(&args.dataset);
    if !paths.db_path.exists() {
        bail!("index database not found: {}", paths.db_path.display());
    }

    let grid = load_grid(&args)?;
    let cases = load_cases(&args.dataset.cases_path)?;
    let gold = gold::shared(&paths.gold_path, Some(&paths.legacy_gold_path));
    if gold.is_empty() {
        warn!(path = %paths.gold_path.display(), "gold registry is empty; every combination will score zero");
    }

    let store = ConfigStore::new(&paths.config_path);
    let config = store.snapshot()?;
    let index = SqliteIndex::new(&paths.db_path);
    let workers = args.dataset.workers.max(1);
    let context = EvaluationContext::new(&index, &gold, &config, workers);

    let options = SearchOptions {
        tag_filter: args.tag.as_deref(),
        min_delta: args.min_delta,
        min_tag_hit: args.min_tag_hit,
        workers,
    };
    let outcome = search(&context, &config, &grid, &cases, &options)?;

    let applied = if args.apply {
        match outcome.winner.as_ref() {
            Some(winner) => Some(store.apply(&ApplyRequest {
                weights: &winner.patch,
                tag: args.tag.as_deref(),
                min_delta: args.min_delta,
                baseline_score: outcome.baseline.hits as f64,
                candidate_score: winner.result.hits as f64,
            })?),
            None => {
                warn!("no grid combination survived the per-tag floor; nothing to apply");
                None
            }
        }
    } else {
        None
    };

    let report_path = match &args.report_path {
        Some(path) => path.clone(),
        None => {
            ensure_directory(&paths.reports_dir)?;
            paths
                .reports_dir
                .join(format!("tune-{}.json", utc_compact_string(Utc::now())))
        }
    };
    let report = TuneReport {
        generated_at: now_utc_string(),
        grid: &grid,
        outcome: &outcome,
        apply: applied.as_ref(),
    };
    write_json_pretty(&report_path, &report)?;
    info!(path = %report_path.display(), "tuning report written");

    if args.json {
        write_json_stdout(&report, "tuning")
    } else {
        write_text_summary(&outcome, applied.as_ref(), &report_path)
    }
}

fn load_grid(args: &TuneArgs) -> Result<Grid> {
    match (&args.grid_path, args.params.is_empty()) {
        (None, true) => bail!("tune needs --grid-path or at least one --param"),
        (None, false) => Grid::parse_params(&args.params),
        (Some(path), true) => Grid::load(path),
        (Some(path), false) => {
            let mut params = Grid::load(path)?.params().clone();
            for (name, values) in Grid::parse_params(&args.params)?.params() {
                params.entry(name.clone()).or_default().extend(values.iter().copied());
            }
            Grid::from_map(params)
        }
    }
}

fn write_text_summary(outcome: &SearchOutcome, applied: Option<&ApplyOutcome>, report_path: &Path) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Target: {} cases={} combinations={} discarded={}",
        outcome.target, outcome.cases, outcome.evaluated, outcome.discarded
    )?;
    writeln!(
        output,
        "Baseline: hits={} micro={:.4}",
        outcome.baseline.hits, outcome.baseline.micro
    )?;
    match &outcome.winner {
        Some(winner) => {
            writeln!(
                output,
                "Winner: #{} hits={} micro={:.4} improvement={:+} meets_min_delta={}",
                winner.index, winner.result.hits, winner.result.micro, outcome.improvement, outcome.meets_min_delta
            )?;
            let patch = serde_json::to_string(&winner.patch)?;
            writeln!(output, "\t{patch}")?;
        }
        None => writeln!(output, "Winner: none")?,
    }

    writeln!(output, "Leaderboard:")?;
    for (rank, combo) in outcome.leaderboard.iter().enumerate() {
        let patch = serde_json::to_string(&combo.patch)?;
        writeln!(
            output,
            "{}.\thits={}\tmicro={:.4}\t{patch}",
            rank + 1,
            combo.result.hits,
            combo.result.micro
        )?;
    }

    if let Some(applied) = applied {
        writeln!(
            output,
            "Apply: applied={} target={} delta={:+}",
            applied.applied, applied.target, applied.delta
        )?;
        for reason in &applied.reasons {
            writeln!(output, "\t- {reason}")?;
        }
    }
    writeln!(output, "Report: {}", report_path.display())?;

    output.flush()?;
    Ok(())
}
