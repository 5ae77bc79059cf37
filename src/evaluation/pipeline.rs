use super::*;

pub const DEFAULT_WORKERS: usize = 3;

/// Everything the per-case pipeline reads besides the weights and limits.
pub struct EvaluationContext<'a> {
    pub index: &'a dyn ChunkIndex,
    pub gold: &'a GoldRegistry,
    pub rerank: RerankSettings,
    pub adjacency: AdjacencyPolicy,
    pub tuned_tags: BTreeSet<String>,
    pub workers: usize,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        index: &'a dyn ChunkIndex,
        gold: &'a GoldRegistry,
        config: &RankingConfig,
        workers: usize,
    ) -> Self {
        Self {
            index,
            gold,
            rerank: config.rerank,
            adjacency: config.adjacency,
            tuned_tags: config.tuned_tags(),
            workers,
        }
    }

    pub fn with_workers(&self, workers: usize) -> EvaluationContext<'a> {
        EvaluationContext {
            index: self.index,
            gold: self.gold,
            rerank: self.rerank,
            adjacency: self.adjacency,
            tuned_tags: self.tuned_tags.clone(),
            workers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub id: String,
    pub tag: String,
    pub hit: bool,
    pub cold_start: bool,
    pub returned: Vec<String>,
    pub failed_channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedEvaluation {
    pub result: EvaluationResult,
    pub cases: Vec<CaseOutcome>,
}

pub fn evaluate(
    context: &EvaluationContext<'_>,
    cases: &[EvalCase],
    weights: &dyn WeightsProvider,
    limits: &dyn LimitsProvider,
) -> Result<EvaluationResult> {
    Ok(evaluate_detailed(context, cases, weights, limits)?.result)
}

/// Runs every case through build -> retrieve -> rerank -> cap -> hit check
/// on a pool of `context.workers` threads, then aggregates on the caller.
pub fn evaluate_detailed(
    context: &EvaluationContext<'_>,
    cases: &[EvalCase],
    weights: &dyn WeightsProvider,
    limits: &dyn LimitsProvider,
) -> Result<DetailedEvaluation> {
    let outcomes = if context.workers <= 1 || cases.len() <= 1 {
        cases
            .iter()
            .map(|case| evaluate_case(context, case, weights, limits))
            .collect::<Vec<CaseOutcome>>()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(context.workers)
            .build()
            .context("failed to build evaluation worker pool")?;
        pool.install(|| {
            cases
                .par_iter()
                .map(|case| evaluate_case(context, case, weights, limits))
                .collect::<Vec<CaseOutcome>>()
        })
    };

    let result = aggregate(&outcomes);
    info!(
        cases = result.total_cases,
        hits = result.hits,
        micro = result.micro,
        macro_rate = result.macro_rate,
        "evaluation finished"
    );
    Ok(DetailedEvaluation {
        result,
        cases: outcomes,
    })
}

pub fn evaluate_case(
    context: &EvaluationContext<'_>,
    case: &EvalCase,
    weights: &dyn WeightsProvider,
    limits: &dyn LimitsProvider,
) -> CaseOutcome {
    let queries = build_channel_queries(&case.query, &case.tag, &context.tuned_tags);
    let case_weights = weights.weights_for(&case.tag);
    let case_limits = limits.limits_for(&case.tag);

    let request = RetrievalRequest::new(&queries, &case_weights, case_limits.shortlist)
        .with_vector(case.query_vector.as_deref())
        .with_tag(&case.tag);
    let trace = retrieve_with_trace(context.index, &request, &context.adjacency);

    let reranked = rerank(
        trace.candidates,
        context.rerank.alpha,
        context.rerank.per_source_penalty,
        case_limits.topk,
    );
    let kept = cap(reranked, case_weights.per_file_cap as usize);

    CaseOutcome {
        id: case.id.clone(),
        tag: case.tag.clone(),
        hit: context.gold.is_hit(&case.id, &kept),
        cold_start: queries.cold_start,
        returned: kept.into_iter().map(|candidate| candidate.file_path).collect(),
        failed_channels: trace.failed,
    }
}

fn aggregate(outcomes: &[CaseOutcome]) -> EvaluationResult {
    let mut tallies = BTreeMap::<String, TagTally>::new();
    for outcome in outcomes {
        let tally = tallies.entry(outcome.tag.clone()).or_default();
        tally.total += 1;
        if outcome.hit {
            tally.hits += 1;
        }
    }
    EvaluationResult::from_tallies(tallies)
}
