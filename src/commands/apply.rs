use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::ApplyArgs;
use crate::commands::{CachePaths, read_weight_patch, write_json_stdout};
use crate::weights::{ApplyOutcome, ApplyRequest, ConfigStore};

pub fn run(args: ApplyArgs) -> Result<()> {
    let paths = CachePaths::from_store(&args.store);
    let patch = read_weight_patch(&args.weights_path)?;
    info!(
        patch = %args.weights_path.display(),
        config = %paths.config_path.display(),
        "apply requested"
    );

    let store = ConfigStore::new(&paths.config_path);
    let outcome = store.apply(&ApplyRequest {
        weights: &patch,
        tag: args.tag.as_deref(),
        min_delta: args.min_delta,
        baseline_score: args.baseline_score,
        candidate_score: args.candidate_score,
    })?;

    if args.json {
        write_json_stdout(&outcome, "apply")
    } else {
        write_text_outcome(&outcome)
    }
}

fn write_text_outcome(outcome: &ApplyOutcome) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Apply: applied={} target={} delta={:+} min_delta={}",
        outcome.applied, outcome.target, outcome.delta, outcome.min_delta
    )?;
    writeln!(output, "Config: {}", outcome.config_path.display())?;
    if let Some(backup_path) = &outcome.backup_path {
        writeln!(output, "Backup: {}", backup_path.display())?;
    }
    for reason in &outcome.reasons {
        writeln!(output, "\t- {reason}")?;
    }

    output.flush()?;
    Ok(())
}
