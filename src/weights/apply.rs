use super::*;

#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    pub weights: &'a WeightPatch,
    pub tag: Option<&'a str>,
    pub min_delta: f64,
    pub baseline_score: f64,
    pub candidate_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    pub applied: bool,
    pub target: String,
    pub delta: f64,
    pub min_delta: f64,
    pub reasons: Vec<String>,
    pub config_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

impl ConfigStore {
    /// The only mutation path. Refuses without touching disk unless the
    /// candidate beats the baseline by `min_delta` and the merged artifact
    /// validates; otherwise backs up the current artifact and replaces it
    /// atomically.
    pub fn apply(&self, request: &ApplyRequest<'_>) -> Result<ApplyOutcome> {
        let tag = request
            .tag
            .map(str::trim)
            .filter(|tag| !tag.is_empty());
        let delta = request.candidate_score - request.baseline_score;

        let mut outcome = ApplyOutcome {
            applied: false,
            target: tag.unwrap_or("default").to_string(),
            delta,
            min_delta: request.min_delta,
            reasons: Vec::new(),
            config_path: self.path().to_path_buf(),
            backup_path: None,
        };

        if delta.is_nan() || delta < request.min_delta {
            outcome.reasons.push(format!(
                "improvement {delta:.4} is below min_delta {:.4} (shortfall {:.4})",
                request.min_delta,
                request.min_delta - delta
            ));
            info!(
                scope = %outcome.target,
                delta,
                min_delta = request.min_delta,
                "config apply refused"
            );
            return Ok(outcome);
        }

        if request.weights.is_empty() {
            outcome.reasons.push("weight patch sets no fields".to_string());
            info!(scope = %outcome.target, "config apply refused: empty patch");
            return Ok(outcome);
        }

        if let Some(tag) = tag
            && RESERVED_KEYS.contains(&tag)
        {
            outcome
                .reasons
                .push(format!("`{tag}` is reserved and cannot name a tag override"));
            info!(scope = %outcome.target, "config apply refused: reserved tag");
            return Ok(outcome);
        }

        let current = read_config(self.path())?;
        let next = current.with_patch(tag, request.weights);
        let errors = next.validation_errors();
        if !errors.is_empty() {
            for error in &errors {
                warn!(scope = %outcome.target, reason = %error, "config apply rejected");
            }
            outcome.reasons = errors;
            return Ok(outcome);
        }

        let rendered = render_config(&next)?;
        if self.path().exists() {
            outcome.backup_path = Some(backup_artifact(self.path(), &self.backup_dir())?);
        }
        write_atomic(self.path(), rendered.as_bytes())?;
        self.reload()?;

        outcome.applied = true;
        info!(
            scope = %outcome.target,
            delta,
            path = %self.path().display(),
            backup = %outcome
                .backup_path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            "config apply written"
        );
        Ok(outcome)
    }
}
