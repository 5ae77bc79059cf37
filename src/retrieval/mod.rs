use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::ChannelQuerySet;
use crate::index::{Channel, ChannelLookup, ChunkIndex, IndexRow};
use crate::model::RetrievalCandidate;
use crate::util::normalize_path_key;
use crate::weights::{AdjacencyPolicy, WeightVector};

mod adjacency;
mod fusion;

#[cfg(test)]
mod tests;

pub use adjacency::adjacency_boosts;
pub use fusion::fused_score;

use fusion::Fusion;

pub const CHANNEL_FETCH_FACTOR: usize = 3;
pub const MAX_CHANNEL_FETCH: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'a> {
    pub queries: &'a ChannelQuerySet,
    pub query_vector: Option<&'a [f32]>,
    pub k: usize,
    pub weights: &'a WeightVector,
    pub tag: &'a str,
    pub fname_regex: Option<&'a str>,
    pub adjacency: bool,
    pub cold_start: bool,
}

impl<'a> RetrievalRequest<'a> {
    /// Request with hints, adjacency toggle and cold-start flag taken from
    /// the query set and weight vector.
    pub fn new(queries: &'a ChannelQuerySet, weights: &'a WeightVector, k: usize) -> Self {
        Self {
            queries,
            query_vector: None,
            k,
            weights,
            tag: "",
            fname_regex: queries.fname_regex.as_deref(),
            adjacency: weights.adjacency_db,
            cold_start: queries.cold_start,
        }
    }

    pub fn with_vector(mut self, query_vector: Option<&'a [f32]>) -> Self {
        self.query_vector = query_vector;
        self
    }

    pub fn with_tag(mut self, tag: &'a str) -> Self {
        self.tag = tag;
        self
    }

    fn fetch_limit(&self) -> usize {
        let base = self.k.saturating_mul(CHANNEL_FETCH_FACTOR).min(MAX_CHANNEL_FETCH);
        if self.cold_start {
            base.saturating_mul(2)
        } else {
            base
        }
    }

    fn channel_text(&self, channel: Channel) -> &'a str {
        match channel {
            Channel::Path | Channel::Short => &self.queries.short,
            Channel::Title => &self.queries.title,
            Channel::Bm25 | Channel::Vector => &self.queries.bm25,
        }
    }

    fn skips(&self, channel: Channel) -> bool {
        match channel {
            Channel::Title => self.cold_start,
            Channel::Path => self.cold_start && self.fname_regex.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalTrace {
    pub candidates: Vec<RetrievalCandidate>,
    pub channel_rows: BTreeMap<Channel, usize>,
    pub skipped: Vec<Channel>,
    pub failed: Vec<Channel>,
}

pub fn retrieve(
    index: &dyn ChunkIndex,
    request: &RetrievalRequest<'_>,
    policy: &AdjacencyPolicy,
) -> Vec<RetrievalCandidate> {
    retrieve_with_trace(index, request, policy).candidates
}

/// Issues one lookup per channel, fuses the rows into scored candidates and
/// returns at most `k` of them by descending score. A failing channel
/// contributes zero; if every attempted channel fails the list is empty.
pub fn retrieve_with_trace(
    index: &dyn ChunkIndex,
    request: &RetrievalRequest<'_>,
    policy: &AdjacencyPolicy,
) -> RetrievalTrace {
    let mut trace = RetrievalTrace::default();
    if request.k == 0 {
        return trace;
    }

    let limit = request.fetch_limit();
    let mut fusion = Fusion::default();
    let mut attempted = 0_usize;

    for channel in Channel::ALL {
        if request.skips(channel) {
            trace.skipped.push(channel);
            continue;
        }

        attempted += 1;
        let lookup = ChannelLookup {
            channel,
            text: request.channel_text(channel),
            vector: if channel == Channel::Vector {
                request.query_vector
            } else {
                None
            },
            fname_regex: if channel == Channel::Path {
                request.fname_regex
            } else {
                None
            },
            limit,
        };

        match index.lookup(&lookup) {
            Ok(rows) => {
                trace.channel_rows.insert(channel, rows.len());
                fusion.absorb(channel, rows);
            }
            Err(err) => {
                warn!(
                    channel = %channel,
                    tag = %request.tag,
                    error = %format!("{err:#}"),
                    "channel lookup failed; contribution set to zero"
                );
                trace.failed.push(channel);
            }
        }
    }

    if attempted > 0 && trace.failed.len() == attempted {
        warn!(tag = %request.tag, channels = attempted, "all channel lookups failed; returning no candidates");
        return trace;
    }

    let mut candidates = fusion.into_candidates();
    for candidate in candidates.iter_mut() {
        candidate.score = fused_score(request.weights, candidate);
    }

    if request.adjacency {
        let boosts = adjacency_boosts(&candidates, policy);
        for (candidate, boost) in candidates.iter_mut().zip(boosts) {
            candidate.s_adjacency = boost;
            candidate.score += boost;
        }
    }

    sort_candidates(&mut candidates);
    candidates.truncate(request.k);

    debug!(
        tag = %request.tag,
        candidates = candidates.len(),
        skipped = trace.skipped.len(),
        failed = trace.failed.len(),
        "retrieval fused"
    );
    trace.candidates = candidates;
    trace
}

/// Descending score, then most recent `modified_at`. The sort is stable, so
/// remaining ties keep first-seen order.
pub fn sort_candidates(candidates: &mut [RetrievalCandidate]) {
    candidates.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| right.modified_at.cmp(&left.modified_at))
    });
}
