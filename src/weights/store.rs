use super::*;

pub const BACKUP_DIR_NAME: &str = "backups";

/// File-backed configuration store. The parsed artifact is memoized and
/// only re-read on an explicit [`ConfigStore::reload`] or a successful apply.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    snapshot: RwLock<Option<Arc<RankingConfig>>>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(|parent| parent.join(BACKUP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR_NAME))
    }

    pub fn snapshot(&self) -> Result<Arc<RankingConfig>> {
        if let Some(config) = self.snapshot.read().as_ref() {
            return Ok(Arc::clone(config));
        }

        let mut guard = self.snapshot.write();
        if let Some(config) = guard.as_ref() {
            return Ok(Arc::clone(config));
        }
        let config = Arc::new(read_config(&self.path)?);
        *guard = Some(Arc::clone(&config));
        Ok(config)
    }

    pub fn reload(&self) -> Result<Arc<RankingConfig>> {
        let config = Arc::new(read_config(&self.path)?);
        *self.snapshot.write() = Some(Arc::clone(&config));
        debug!(path = %self.path.display(), "ranking config reloaded");
        Ok(config)
    }

    pub fn load_weights(&self, tag: Option<&str>) -> Result<WeightVector> {
        Ok(self.snapshot()?.resolve_weights(tag))
    }

    pub fn load_limits(&self, tag: Option<&str>) -> Result<LimitSpec> {
        Ok(self.snapshot()?.resolve_limits(tag))
    }
}

/// Reads and validates the artifact at `path`. A missing artifact resolves
/// to the built-in defaults.
pub fn read_config(path: &Path) -> Result<RankingConfig> {
    if !path.exists() {
        info!(path = %path.display(), "ranking config not found; using built-in defaults");
        return Ok(RankingConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ranking config {}", path.display()))?;
    let config = if raw.trim().is_empty() {
        RankingConfig::default()
    } else {
        serde_yaml::from_str::<RankingConfig>(&raw)
            .with_context(|| format!("failed to parse ranking config {}", path.display()))?
    };

    let errors = config.validation_errors();
    if !errors.is_empty() {
        bail!(
            "ranking config {} is invalid: {}",
            path.display(),
            errors.join("; ")
        );
    }
    Ok(config)
}

pub fn render_config(config: &RankingConfig) -> Result<String> {
    serde_yaml::to_string(config).context("failed to serialize ranking config")
}

/// Copies the current artifact to `<backup_dir>/<stem>.<UTC stamp>.yaml`.
pub(super) fn backup_artifact(path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    ensure_directory(backup_dir)?;

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("ranking_weights");
    let stamp = utc_compact_string(Utc::now());

    let mut candidate = backup_dir.join(format!("{stem}.{stamp}.yaml"));
    let mut suffix = 1_u32;
    while candidate.exists() {
        candidate = backup_dir.join(format!("{stem}.{stamp}.{suffix}.yaml"));
        suffix += 1;
    }

    fs::copy(path, &candidate).with_context(|| {
        format!(
            "failed to back up {} to {}",
            path.display(),
            candidate.display()
        )
    })?;
    Ok(candidate)
}
