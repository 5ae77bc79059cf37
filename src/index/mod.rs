use std::fmt;

use anyhow::Result;
use serde::Serialize;

mod sqlite;
#[cfg(test)]
pub mod fake;
#[cfg(test)]
mod tests;

pub use sqlite::{IndexCounts, SqliteIndex};

/// Scoring channels, in the order the engine issues them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Path,
    Short,
    Title,
    Bm25,
    Vector,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Path,
        Channel::Short,
        Channel::Title,
        Channel::Bm25,
        Channel::Vector,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Short => "short",
            Self::Title => "title",
            Self::Bm25 => "bm25",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelLookup<'a> {
    pub channel: Channel,
    pub text: &'a str,
    pub vector: Option<&'a [f32]>,
    pub fname_regex: Option<&'a str>,
    pub limit: usize,
}

/// A row returned by one channel lookup. `score` is normalized to `[0, 1]`
/// within the lookup that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub file_path: String,
    pub chunk_id: Option<String>,
    pub chunk_index: Option<i64>,
    pub score: f64,
    pub snippet: Option<String>,
    pub modified_at: Option<i64>,
}

pub trait ChunkIndex: Sync {
    fn lookup(&self, lookup: &ChannelLookup<'_>) -> Result<Vec<IndexRow>>;
}
