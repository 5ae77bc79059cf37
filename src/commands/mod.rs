use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::{DatasetArgs, StoreArgs};
use crate::weights::WeightPatch;

pub mod apply;
pub mod evaluate;
pub mod query;
pub mod status;
pub mod tune;

/// Default on-disk layout under a cache root. Explicit paths on the command
/// line win over these.
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub reports_dir: PathBuf,
    pub baseline_path: PathBuf,
    pub gold_path: PathBuf,
    pub legacy_gold_path: PathBuf,
}

impl CachePaths {
    pub fn new(root: &Path) -> Self {
        let reports_dir = root.join("reports");
        Self {
            root: root.to_path_buf(),
            db_path: root.join("docrank_index.sqlite"),
            config_path: root.join("config").join("ranking_weights.yaml"),
            baseline_path: reports_dir.join("baseline_metrics.json"),
            reports_dir,
            gold_path: root.join("gold").join("gold_standard.jsonl"),
            legacy_gold_path: root.join("gold").join("gold_legacy.json"),
        }
    }

    pub fn from_store(store: &StoreArgs) -> Self {
        let mut paths = Self::new(&store.cache_root);
        if let Some(db_path) = &store.db_path {
            paths.db_path = db_path.clone();
        }
        if let Some(config_path) = &store.config_path {
            paths.config_path = config_path.clone();
        }
        paths
    }

    pub fn with_dataset(mut self, dataset: &DatasetArgs) -> Self {
        if let Some(gold_path) = &dataset.gold_path {
            self.gold_path = gold_path.clone();
        }
        if let Some(legacy_gold_path) = &dataset.legacy_gold_path {
            self.legacy_gold_path = legacy_gold_path.clone();
        }
        self
    }
}

/// Reads a YAML or JSON weight patch; unknown keys are rejected.
pub fn read_weight_patch(path: &Path) -> Result<WeightPatch> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read weight patch {}", path.display()))?;
    serde_yaml::from_str::<WeightPatch>(&raw)
        .with_context(|| format!("failed to parse weight patch {}", path.display()))
}

pub(crate) fn write_json_stdout<T: Serialize>(value: &T, what: &str) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value)
        .with_context(|| format!("failed to serialize {what} json output"))?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
