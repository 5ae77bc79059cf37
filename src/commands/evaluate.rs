use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::commands::{CachePaths, write_json_stdout};
use crate::evaluation::{
    BaselineMode, EvaluationArtifact, EvaluationContext, GateFloors, GateVerdict, evaluate_detailed, gate,
    load_cases, new_run_id, read_baseline, resolve_baseline_mode, resolve_baseline_path, resolve_gate_floors,
    write_baseline, write_evaluation_artifact,
};
use crate::gold;
use crate::index::SqliteIndex;
use crate::model::EvaluationResult;
use crate::util::{ensure_directory, sha256_file};
use crate::weights::ConfigStore;

pub const GATE_FAILED_EXIT: u8 = 2;

pub fn run(args: EvaluateArgs) -> Result<ExitCode> {
    let paths = CachePaths::from_store(&args.store).with_dataset(&args.dataset);
    if !paths.db_path.exists() {
        bail!("index database not found: {}", paths.db_path.display());
    }

    let floors = cli_floors(resolve_gate_floors(), &args)?;
    let baseline_path = match &args.baseline_path {
        Some(path) => path.clone(),
        None => resolve_baseline_path(&paths.baseline_path),
    };
    let baseline_mode = if args.promote_baseline {
        BaselineMode::Promote
    } else {
        resolve_baseline_mode()
    };

    let cases = load_cases(&args.dataset.cases_path)?;
    let gold = gold::shared(&paths.gold_path, Some(&paths.legacy_gold_path));
    if gold.is_empty() {
        warn!(path = %paths.gold_path.display(), "gold registry is empty; every case will miss");
    }

    let store = ConfigStore::new(&paths.config_path);
    let config = store.snapshot()?;
    let config_checksum = config_checksum(&paths.config_path)?;

    let index = SqliteIndex::new(&paths.db_path);
    let context = EvaluationContext::new(&index, &gold, &config, args.dataset.workers.max(1));
    info!(
        cases = cases.len(),
        gold_cases = gold.len(),
        workers = context.workers,
        baseline_mode = baseline_mode.as_str(),
        "evaluation started"
    );

    let detailed = evaluate_detailed(&context, &cases, config.as_ref(), config.as_ref())?;
    let baseline = read_baseline(&baseline_path)?;
    if baseline.is_none() {
        warn!(path = %baseline_path.display(), "no baseline found; regression check skipped");
    }

    let verdict = gate(&detailed.result, &floors, baseline.as_ref());
    log_verdict(&verdict);

    let run_id = new_run_id();
    let report_path = match &args.report_path {
        Some(path) => path.clone(),
        None => {
            ensure_directory(&paths.reports_dir)?;
            paths.reports_dir.join(format!("{run_id}.json"))
        }
    };
    let artifact = EvaluationArtifact::new(
        run_id,
        config_checksum.clone(),
        &detailed.result,
        &verdict,
        &detailed.cases,
    );
    write_evaluation_artifact(&report_path, &artifact)?;

    if baseline_mode == BaselineMode::Promote {
        if verdict.pass {
            write_baseline(&baseline_path, &detailed.result, config_checksum)?;
        } else {
            warn!(path = %baseline_path.display(), "gate failed; baseline not promoted");
        }
    }

    if args.json {
        write_json_stdout(&artifact, "evaluation")?;
    } else {
        write_text_summary(&detailed.result, baseline.as_ref(), &verdict, &report_path)?;
    }

    if verdict.pass {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(GATE_FAILED_EXIT))
    }
}

fn cli_floors(mut floors: GateFloors, args: &EvaluateArgs) -> Result<GateFloors> {
    for (name, value, slot) in [
        ("--min-micro", args.min_micro, &mut floors.min_micro),
        ("--min-tag", args.min_tag, &mut floors.min_tag),
        ("--max-regression", args.max_regression, &mut floors.max_regression),
    ] {
        if let Some(value) = value {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
            *slot = value;
        }
    }
    Ok(floors)
}

pub(crate) fn config_checksum(path: &Path) -> Result<Option<String>> {
    if path.exists() {
        Ok(Some(sha256_file(path)?))
    } else {
        Ok(None)
    }
}

fn log_verdict(verdict: &GateVerdict) {
    if verdict.pass {
        info!("gate passed");
        return;
    }
    for reason in &verdict.reasons {
        warn!(
            rule = ?reason.rule,
            tag = reason.tag.as_deref().unwrap_or_default(),
            observed = reason.observed,
            threshold = reason.threshold,
            "{}",
            reason.message
        );
    }
}

fn write_text_summary(
    result: &EvaluationResult,
    baseline: Option<&EvaluationResult>,
    verdict: &GateVerdict,
    report_path: &Path,
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Cases: {} hits={} micro={:.4} macro={:.4}",
        result.total_cases, result.hits, result.micro, result.macro_rate
    )?;
    if let Some(baseline) = baseline {
        writeln!(
            output,
            "Baseline: micro={:.4} delta={:+.4}",
            baseline.micro,
            result.micro - baseline.micro
        )?;
    }
    for (tag, rate) in &result.per_tag {
        let counts = result
            .per_tag_counts
            .get(tag)
            .map(|tally| format!("{}/{}", tally.hits, tally.total))
            .unwrap_or_default();
        writeln!(output, "\t{tag}\t{rate:.4}\t{counts}")?;
    }
    writeln!(output, "Gate: {}", if verdict.pass { "pass" } else { "FAIL" })?;
    for reason in &verdict.reasons {
        writeln!(output, "\t- {}", reason.message)?;
    }
    writeln!(output, "Report: {}", report_path.display())?;

    output.flush()?;
    Ok(())
}
