use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channels::build_channel_queries;
use crate::gold::GoldRegistry;
use crate::index::{Channel, ChunkIndex};
use crate::model::{EvalCase, EvalCaseRecord, EvaluationResult, TagTally};
use crate::rerank::{cap, rerank};
use crate::retrieval::{RetrievalRequest, retrieve_with_trace};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};
use crate::weights::{AdjacencyPolicy, LimitsProvider, RankingConfig, RerankSettings, WeightsProvider};

mod baseline;
mod cases;
mod gate;
mod pipeline;


pub use baseline::{
    BaselineArtifact, BaselineMode, EvaluationArtifact, new_run_id, read_baseline, resolve_baseline_mode,
    resolve_baseline_path, write_baseline, write_evaluation_artifact,
};
pub use cases::{load_cases, parse_cases};
pub use gate::{GateFloors, GateReason, GateRule, GateVerdict, gate, resolve_gate_floors};
pub use pipeline::{
    CaseOutcome, DEFAULT_WORKERS, DetailedEvaluation, EvaluationContext, evaluate, evaluate_case,
    evaluate_detailed,
};
