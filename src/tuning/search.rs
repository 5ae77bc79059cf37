use super::*;

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions<'a> {
    pub tag_filter: Option<&'a str>,
    pub min_delta: f64,
    pub min_tag_hit: f64,
    pub workers: usize,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            tag_filter: None,
            min_delta: 0.0,
            min_tag_hit: 0.0,
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboResult {
    pub index: usize,
    pub patch: WeightPatch,
    pub weights: WeightVector,
    pub result: EvaluationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub target: String,
    pub cases: usize,
    pub baseline: EvaluationResult,
    pub winner: Option<ComboResult>,
    pub evaluated: usize,
    pub discarded: usize,
    pub improvement: i64,
    pub meets_min_delta: bool,
    pub leaderboard: Vec<ComboResult>,
}

/// Evaluates the baseline once, then every grid combination on a pool of
/// `options.workers` threads. Combinations whose weakest tag falls below
/// `min_tag_hit` are discarded; the winner has the most hits, earliest
/// combination on ties. Nothing is written.
pub fn search(
    context: &EvaluationContext<'_>,
    config: &RankingConfig,
    grid: &Grid,
    cases: &[EvalCase],
    options: &SearchOptions<'_>,
) -> Result<SearchOutcome> {
    let tag_filter = options
        .tag_filter
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    let selected = cases
        .iter()
        .filter(|case| tag_filter.is_none_or(|tag| case.tag == tag))
        .cloned()
        .collect::<Vec<EvalCase>>();
    if selected.is_empty() {
        bail!(
            "no evaluation cases match tag `{}`",
            tag_filter.unwrap_or_default()
        );
    }

    let combos = grid.combinations()?;
    if combos.is_empty() {
        bail!("grid produced no combinations");
    }

    let target = tag_filter.unwrap_or("default").to_string();
    info!(
        target_block = %target,
        cases = selected.len(),
        combinations = combos.len(),
        workers = options.workers,
        "grid search started"
    );

    let baseline = evaluate(context, &selected, config, config)?;

    let inner = context.with_workers(1);
    let run_combo = |(index, patch): (usize, &WeightPatch)| -> Result<ComboResult> {
        let patched = config.with_patch(tag_filter, patch);
        let result = evaluate(&inner, &selected, &patched, &patched)?;
        Ok(ComboResult {
            index,
            patch: patch.clone(),
            weights: patched.resolve_weights(tag_filter),
            result,
        })
    };

    let evaluated = if options.workers <= 1 {
        combos
            .iter()
            .enumerate()
            .map(run_combo)
            .collect::<Result<Vec<ComboResult>>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
            .context("failed to build grid search worker pool")?;
        pool.install(|| {
            combos
                .par_iter()
                .enumerate()
                .map(run_combo)
                .collect::<Result<Vec<ComboResult>>>()
        })?
    };

    let mut kept = Vec::<ComboResult>::new();
    let mut discarded = 0_usize;
    for combo in evaluated {
        let weakest = combo.result.min_tag_rate().unwrap_or(0.0);
        if weakest < options.min_tag_hit {
            discarded += 1;
            debug!(
                combination = combo.index,
                weakest_tag_rate = weakest,
                "grid combination below per-tag floor"
            );
            continue;
        }
        kept.push(combo);
    }

    let mut winner = None::<&ComboResult>;
    for combo in &kept {
        if winner.is_none_or(|best| combo.result.hits > best.result.hits) {
            winner = Some(combo);
        }
    }
    let winner = winner.cloned();

    let improvement = winner
        .as_ref()
        .map(|combo| combo.result.hits as i64 - baseline.hits as i64)
        .unwrap_or(0);
    let meets_min_delta = winner.is_some() && improvement as f64 >= options.min_delta;

    let mut leaderboard = kept;
    leaderboard.sort_by(|left, right| right.result.hits.cmp(&left.result.hits));
    leaderboard.truncate(LEADERBOARD_SIZE);

    info!(
        evaluated = combos.len(),
        discarded,
        baseline_hits = baseline.hits,
        winner_hits = ?winner.as_ref().map(|combo| combo.result.hits),
        improvement,
        meets_min_delta,
        "grid search finished"
    );

    Ok(SearchOutcome {
        target,
        cases: selected.len(),
        baseline,
        winner,
        evaluated: combos.len(),
        discarded,
        improvement,
        meets_min_delta,
        leaderboard,
    })
}
