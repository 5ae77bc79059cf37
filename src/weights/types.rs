use super::*;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_SHORTLIST: usize = 40;
pub const DEFAULT_TOPK: usize = 10;

/// Top-level keys of the artifact that are not tag overrides.
pub const RESERVED_KEYS: [&str; 5] = ["version", "default", "limits", "adjacency", "rerank"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightVector {
    pub w_path: f64,
    pub w_short: f64,
    pub w_title: f64,
    pub w_bm25: f64,
    pub w_vec: f64,
    pub adjacency_db: bool,
    pub per_file_cap: u32,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            w_path: 0.6,
            w_short: 0.8,
            w_title: 0.5,
            w_bm25: 1.0,
            w_vec: 1.0,
            adjacency_db: true,
            per_file_cap: 2,
        }
    }
}

impl WeightVector {
    fn named_weights(&self) -> [(&'static str, f64); 5] {
        [
            ("w_path", self.w_path),
            ("w_short", self.w_short),
            ("w_title", self.w_title),
            ("w_bm25", self.w_bm25),
            ("w_vec", self.w_vec),
        ]
    }
}

/// Partial weight block. Unset fields inherit from whatever it is merged onto.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_path: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_short: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_title: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_bm25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_vec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_db: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_file_cap: Option<u32>,
}

impl WeightPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, base: WeightVector) -> WeightVector {
        WeightVector {
            w_path: self.w_path.unwrap_or(base.w_path),
            w_short: self.w_short.unwrap_or(base.w_short),
            w_title: self.w_title.unwrap_or(base.w_title),
            w_bm25: self.w_bm25.unwrap_or(base.w_bm25),
            w_vec: self.w_vec.unwrap_or(base.w_vec),
            adjacency_db: self.adjacency_db.unwrap_or(base.adjacency_db),
            per_file_cap: self.per_file_cap.unwrap_or(base.per_file_cap),
        }
    }

    /// Fields set in `newer` replace this patch's fields.
    pub fn merged(&self, newer: &WeightPatch) -> WeightPatch {
        WeightPatch {
            w_path: newer.w_path.or(self.w_path),
            w_short: newer.w_short.or(self.w_short),
            w_title: newer.w_title.or(self.w_title),
            w_bm25: newer.w_bm25.or(self.w_bm25),
            w_vec: newer.w_vec.or(self.w_vec),
            adjacency_db: newer.adjacency_db.or(self.adjacency_db),
            per_file_cap: newer.per_file_cap.or(self.per_file_cap),
        }
    }

    fn named_weights(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("w_path", self.w_path),
            ("w_short", self.w_short),
            ("w_title", self.w_title),
            ("w_bm25", self.w_bm25),
            ("w_vec", self.w_vec),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSpec {
    pub shortlist: usize,
    pub topk: usize,
}

impl Default for LimitSpec {
    fn default() -> Self {
        Self {
            shortlist: DEFAULT_SHORTLIST,
            topk: DEFAULT_TOPK,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortlist: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topk: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsBlock {
    #[serde(default)]
    pub default: LimitSpec,
    #[serde(flatten)]
    pub tags: BTreeMap<String, LimitPatch>,
}

/// Locality prior applied by the retrieval engine when `adjacency_db` is on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyPolicy {
    pub boost: f64,
    pub radius: u32,
    pub decay: f64,
}

impl Default for AdjacencyPolicy {
    fn default() -> Self {
        Self {
            boost: 0.15,
            radius: 1,
            decay: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub alpha: f64,
    pub per_source_penalty: f64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            per_source_penalty: 0.5,
        }
    }
}

/// The whole configuration artifact: a default weight block plus tag-named
/// partial overrides that merge on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub default: WeightVector,
    #[serde(default)]
    pub limits: LimitsBlock,
    #[serde(default)]
    pub adjacency: AdjacencyPolicy,
    #[serde(default)]
    pub rerank: RerankSettings,
    #[serde(flatten)]
    pub overrides: BTreeMap<String, WeightPatch>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            default: WeightVector::default(),
            limits: LimitsBlock::default(),
            adjacency: AdjacencyPolicy::default(),
            rerank: RerankSettings::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl RankingConfig {
    pub fn resolve_weights(&self, tag: Option<&str>) -> WeightVector {
        match tag.and_then(|tag| self.overrides.get(tag.trim())) {
            Some(patch) => patch.apply_to(self.default),
            None => self.default,
        }
    }

    pub fn resolve_limits(&self, tag: Option<&str>) -> LimitSpec {
        let base = self.limits.default;
        match tag.and_then(|tag| self.limits.tags.get(tag.trim())) {
            Some(patch) => LimitSpec {
                shortlist: patch.shortlist.unwrap_or(base.shortlist),
                topk: patch.topk.unwrap_or(base.topk),
            },
            None => base,
        }
    }

    /// Tags carrying a weight or limit override of their own.
    pub fn tuned_tags(&self) -> BTreeSet<String> {
        self.overrides
            .keys()
            .chain(self.limits.tags.keys())
            .cloned()
            .collect()
    }

    /// Returns a copy with `patch` merged into the default block, or into
    /// the `tag` override block when a tag is given. Other tags are untouched.
    pub fn with_patch(&self, tag: Option<&str>, patch: &WeightPatch) -> RankingConfig {
        let mut next = self.clone();
        match tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => {
                let merged = next
                    .overrides
                    .get(tag)
                    .map(|existing| existing.merged(patch))
                    .unwrap_or_else(|| patch.clone());
                next.overrides.insert(tag.to_string(), merged);
            }
            None => next.default = patch.apply_to(next.default),
        }
        next
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::<String>::new();

        for (name, value) in self.default.named_weights() {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("default.{name} must be a non-negative number (got {value})"));
            }
        }
        if self.default.per_file_cap == 0 {
            errors.push("default.per_file_cap must be at least 1".to_string());
        }

        for (tag, patch) in &self.overrides {
            if RESERVED_KEYS.contains(&tag.as_str()) {
                errors.push(format!("`{tag}` is reserved and cannot name a tag override"));
            }
            for (name, value) in patch.named_weights() {
                if let Some(value) = value
                    && (!value.is_finite() || value < 0.0)
                {
                    errors.push(format!("{tag}.{name} must be a non-negative number (got {value})"));
                }
            }
            if patch.per_file_cap == Some(0) {
                errors.push(format!("{tag}.per_file_cap must be at least 1"));
            }
        }

        let default_limits = self.limits.default;
        if default_limits.shortlist == 0 || default_limits.topk == 0 {
            errors.push("limits.default shortlist and topk must be at least 1".to_string());
        }
        for (tag, patch) in &self.limits.tags {
            if patch.shortlist == Some(0) || patch.topk == Some(0) {
                errors.push(format!("limits.{tag} shortlist and topk must be at least 1"));
            }
        }

        let adjacency = self.adjacency;
        if !adjacency.boost.is_finite() || adjacency.boost < 0.0 {
            errors.push(format!("adjacency.boost must be a non-negative number (got {})", adjacency.boost));
        }
        if !(0.0..=1.0).contains(&adjacency.decay) {
            errors.push(format!("adjacency.decay must be within [0, 1] (got {})", adjacency.decay));
        }

        let rerank = self.rerank;
        if !(0.0..=1.0).contains(&rerank.alpha) {
            errors.push(format!("rerank.alpha must be within [0, 1] (got {})", rerank.alpha));
        }
        if !rerank.per_source_penalty.is_finite() || rerank.per_source_penalty < 0.0 {
            errors.push(format!(
                "rerank.per_source_penalty must be a non-negative number (got {})",
                rerank.per_source_penalty
            ));
        }

        errors
    }
}

pub trait WeightsProvider: Sync {
    fn weights_for(&self, tag: &str) -> WeightVector;
}

pub trait LimitsProvider: Sync {
    fn limits_for(&self, tag: &str) -> LimitSpec;
}

impl WeightsProvider for RankingConfig {
    fn weights_for(&self, tag: &str) -> WeightVector {
        self.resolve_weights(Some(tag))
    }
}

impl LimitsProvider for RankingConfig {
    fn limits_for(&self, tag: &str) -> LimitSpec {
        self.resolve_limits(Some(tag))
    }
}
