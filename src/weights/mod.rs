use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::util::{ensure_directory, utc_compact_string, write_atomic};

mod apply;
mod store;
mod types;


pub use apply::{ApplyOutcome, ApplyRequest};
pub use store::{ConfigStore, read_config, render_config};
pub use types::{
    AdjacencyPolicy, LimitPatch, LimitSpec, LimitsBlock, LimitsProvider, RESERVED_KEYS,
    RankingConfig, RerankSettings, WeightPatch, WeightVector, WeightsProvider,
};

use store::backup_artifact;
