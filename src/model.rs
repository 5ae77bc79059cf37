use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const UNTAGGED: &str = "untagged";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalCase {
    pub id: String,
    pub query: String,
    pub tag: String,
    pub query_vector: Option<Vec<f32>>,
}

/// Raw dataset row; `tags` wins over `tag` and only its first element is used.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCaseRecord {
    #[serde(alias = "case_id", alias = "qid")]
    pub id: String,
    #[serde(alias = "question", alias = "text")]
    pub query: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "embedding", alias = "vector")]
    pub query_vector: Option<Vec<f32>>,
}

impl EvalCaseRecord {
    pub fn into_case(self) -> EvalCase {
        let tag = self
            .tags
            .into_iter()
            .chain(self.tag)
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| UNTAGGED.to_string());

        EvalCase {
            id: self.id.trim().to_string(),
            query: self.query,
            tag,
            query_vector: self.query_vector.filter(|vector| !vector.is_empty()),
        }
    }
}

/// One fused retrieval unit. Channel scores default to zero when a channel
/// did not return the unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalCandidate {
    pub file_path: String,
    pub chunk_id: Option<String>,
    pub chunk_index: Option<i64>,
    pub snippet: Option<String>,
    pub modified_at: Option<i64>,
    pub s_path: f64,
    pub s_short: f64,
    pub s_title: f64,
    pub s_bm25: f64,
    pub s_vec: f64,
    pub s_adjacency: f64,
    pub score: f64,
}

impl RetrievalCandidate {
    pub fn for_path(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTally {
    pub hits: usize,
    pub total: usize,
}

impl TagTally {
    pub fn rate(self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub hits: usize,
    pub total_cases: usize,
    pub micro: f64,
    #[serde(rename = "macro")]
    pub macro_rate: f64,
    pub per_tag: BTreeMap<String, f64>,
    #[serde(default)]
    pub per_tag_counts: BTreeMap<String, TagTally>,
}

impl EvaluationResult {
    pub fn from_tallies(tallies: BTreeMap<String, TagTally>) -> Self {
        let hits = tallies.values().map(|tally| tally.hits).sum::<usize>();
        let total_cases = tallies.values().map(|tally| tally.total).sum::<usize>();
        let micro = if total_cases == 0 {
            0.0
        } else {
            hits as f64 / total_cases as f64
        };

        let per_tag = tallies
            .iter()
            .map(|(tag, tally)| (tag.clone(), tally.rate()))
            .collect::<BTreeMap<String, f64>>();
        let macro_rate = if per_tag.is_empty() {
            0.0
        } else {
            per_tag.values().sum::<f64>() / per_tag.len() as f64
        };

        Self {
            hits,
            total_cases,
            micro,
            macro_rate,
            per_tag,
            per_tag_counts: tallies,
        }
    }

    pub fn min_tag_rate(&self) -> Option<f64> {
        self.per_tag.values().copied().reduce(f64::min)
    }
}
