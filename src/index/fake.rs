//! Deterministic in-memory index for engine, evaluation and tuner tests.

use std::collections::HashSet;

use anyhow::{Result, bail};
use parking_lot::Mutex;

use super::{Channel, ChannelLookup, ChunkIndex, IndexRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedLookup {
    pub channel: Channel,
    pub limit: usize,
    pub had_vector: bool,
    pub had_fname_regex: bool,
}

#[derive(Debug, Default)]
pub struct FakeIndex {
    rules: Vec<(Channel, String, Vec<IndexRow>)>,
    failing: HashSet<Channel>,
    calls: Mutex<Vec<RecordedLookup>>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by `channel` whenever the lookup text contains `needle`
    /// (case-insensitive). An empty needle matches every query.
    pub fn with_rows(mut self, channel: Channel, needle: &str, rows: Vec<IndexRow>) -> Self {
        self.rules.push((channel, needle.to_lowercase(), rows));
        self
    }

    pub fn failing(mut self, channel: Channel) -> Self {
        self.failing.insert(channel);
        self
    }

    pub fn calls(&self) -> Vec<RecordedLookup> {
        self.calls.lock().clone()
    }
}

impl ChunkIndex for FakeIndex {
    fn lookup(&self, lookup: &ChannelLookup<'_>) -> Result<Vec<IndexRow>> {
        self.calls.lock().push(RecordedLookup {
            channel: lookup.channel,
            limit: lookup.limit,
            had_vector: lookup.vector.is_some(),
            had_fname_regex: lookup.fname_regex.is_some(),
        });

        if self.failing.contains(&lookup.channel) {
            bail!("{} channel unavailable", lookup.channel);
        }

        let text = lookup.text.to_lowercase();
        let mut rows = self
            .rules
            .iter()
            .filter(|(channel, needle, _)| *channel == lookup.channel && text.contains(needle.as_str()))
            .flat_map(|(_, _, rows)| rows.iter().cloned())
            .collect::<Vec<IndexRow>>();
        rows.truncate(lookup.limit);
        Ok(rows)
    }
}

pub fn row(file_path: &str, chunk_id: &str, chunk_index: i64, score: f64) -> IndexRow {
    IndexRow {
        file_path: file_path.to_string(),
        chunk_id: Some(chunk_id.to_string()),
        chunk_index: Some(chunk_index),
        score,
        snippet: None,
        modified_at: None,
    }
}
