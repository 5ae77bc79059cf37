use super::*;

pub const ARTIFACT_MANIFEST_VERSION: u32 = 1;
pub const BASELINE_MODE_ENV: &str = "DOCRANK_BASELINE_MODE";
pub const BASELINE_PATH_ENV: &str = "DOCRANK_BASELINE_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    Verify,
    Promote,
}

impl BaselineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Promote => "promote",
        }
    }
}

pub fn resolve_baseline_mode() -> BaselineMode {
    parse_baseline_mode(std::env::var(BASELINE_MODE_ENV).ok().as_deref())
}

pub fn parse_baseline_mode(value: Option<&str>) -> BaselineMode {
    match value {
        Some(value)
            if value.trim().eq_ignore_ascii_case("promote")
                || value.trim().eq_ignore_ascii_case("rotate") =>
        {
            BaselineMode::Promote
        }
        _ => BaselineMode::Verify,
    }
}

pub fn resolve_baseline_path(default: &Path) -> PathBuf {
    parse_baseline_path(std::env::var(BASELINE_PATH_ENV).ok().as_deref(), default)
}

pub fn parse_baseline_path(value: Option<&str>, default: &Path) -> PathBuf {
    if let Some(value) = value {
        let candidate = value.trim();
        if !candidate.is_empty() {
            return PathBuf::from(candidate);
        }
    }
    default.to_path_buf()
}

/// Stored aggregate used by the regression check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineArtifact {
    #[serde(default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub config_checksum: Option<String>,
    #[serde(flatten)]
    pub metrics: EvaluationResult,
}

/// Full record of one gated evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationArtifact<'a> {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub config_checksum: Option<String>,
    #[serde(flatten)]
    pub metrics: &'a EvaluationResult,
    pub gate: &'a GateVerdict,
    pub cases: &'a [CaseOutcome],
}

impl<'a> EvaluationArtifact<'a> {
    pub fn new(
        run_id: String,
        config_checksum: Option<String>,
        metrics: &'a EvaluationResult,
        gate: &'a GateVerdict,
        cases: &'a [CaseOutcome],
    ) -> Self {
        Self {
            manifest_version: ARTIFACT_MANIFEST_VERSION,
            run_id,
            generated_at: now_utc_string(),
            config_checksum,
            metrics,
            gate,
            cases,
        }
    }
}

pub fn new_run_id() -> String {
    format!("eval-{}", utc_compact_string(chrono::Utc::now()))
}

/// `Ok(None)` when no baseline has been promoted yet.
pub fn read_baseline(path: &Path) -> Result<Option<EvaluationResult>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read baseline {}", path.display()))?;
    let artifact = serde_json::from_str::<BaselineArtifact>(&raw)
        .with_context(|| format!("failed to parse baseline {}", path.display()))?;
    Ok(Some(artifact.metrics))
}

pub fn write_baseline(path: &Path, metrics: &EvaluationResult, config_checksum: Option<String>) -> Result<()> {
    let artifact = BaselineArtifact {
        manifest_version: ARTIFACT_MANIFEST_VERSION,
        generated_at: now_utc_string(),
        config_checksum,
        metrics: metrics.clone(),
    };
    write_json_pretty(path, &artifact)?;
    info!(path = %path.display(), micro = metrics.micro, "baseline promoted");
    Ok(())
}

pub fn write_evaluation_artifact(path: &Path, artifact: &EvaluationArtifact<'_>) -> Result<()> {
    write_json_pretty(path, artifact)?;
    info!(path = %path.display(), run_id = %artifact.run_id, "evaluation artifact written");
    Ok(())
}
