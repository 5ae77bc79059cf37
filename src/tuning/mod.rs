use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evaluation::{DEFAULT_WORKERS, EvaluationContext, evaluate};
use crate::model::{EvalCase, EvaluationResult};
use crate::weights::{RankingConfig, WeightPatch, WeightVector};

mod grid;
mod search;

#[cfg(test)]
mod tests;

pub use grid::{Grid, GridValue};
pub use search::{ComboResult, SearchOptions, SearchOutcome, search};
