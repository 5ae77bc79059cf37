use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::CachePaths;
use crate::commands::evaluate::config_checksum;
use crate::evaluation::{read_baseline, resolve_baseline_path};
use crate::index::SqliteIndex;
use crate::weights::ConfigStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let paths = CachePaths::from_store(&args.store);
    info!(cache_root = %paths.root.display(), "status requested");

    if paths.db_path.exists() {
        match SqliteIndex::new(&paths.db_path).counts() {
            Ok(counts) => info!(
                path = %paths.db_path.display(),
                files = counts.files,
                chunks = counts.chunks,
                embeddings = counts.embeddings,
                "index status"
            ),
            Err(err) => warn!(path = %paths.db_path.display(), error = %err, "index database unreadable"),
        }
    } else {
        warn!(path = %paths.db_path.display(), "index database missing");
    }

    let store = ConfigStore::new(&paths.config_path);
    if paths.config_path.exists() {
        let config = store.snapshot()?;
        info!(
            path = %paths.config_path.display(),
            version = config.version,
            checksum = %config_checksum(&paths.config_path)?.unwrap_or_default(),
            tag_overrides = config.overrides.len(),
            tuned_tags = ?config.tuned_tags(),
            "configuration artifact"
        );
    } else {
        warn!(path = %paths.config_path.display(), "configuration artifact missing; built-in defaults apply");
    }

    let backup_dir = store.backup_dir();
    let backups = std::fs::read_dir(&backup_dir)
        .map(|entries| entries.flatten().count())
        .unwrap_or(0);
    info!(path = %backup_dir.display(), backups, "configuration backups");

    let baseline_path = match &args.baseline_path {
        Some(path) => path.clone(),
        None => resolve_baseline_path(&paths.baseline_path),
    };
    match read_baseline(&baseline_path)? {
        Some(baseline) => info!(
            path = %baseline_path.display(),
            cases = baseline.total_cases,
            hits = baseline.hits,
            micro = baseline.micro,
            macro_rate = baseline.macro_rate,
            "baseline metrics"
        ),
        None => warn!(path = %baseline_path.display(), "baseline metrics missing"),
    }

    Ok(())
}
