use std::collections::HashMap;

use crate::model::RetrievalCandidate;
use crate::util::normalize_path_key;

/// MMR with the same-source proxy: two candidates are `per_source_penalty`
/// similar when their file paths normalize equal, otherwise unrelated.
pub fn rerank(
    candidates: Vec<RetrievalCandidate>,
    alpha: f64,
    per_source_penalty: f64,
    k: usize,
) -> Vec<RetrievalCandidate> {
    let penalty = if per_source_penalty.is_finite() {
        per_source_penalty.max(0.0)
    } else {
        0.0
    };
    rerank_with(candidates, alpha, k, |left, right| {
        if normalize_path_key(&left.file_path) == normalize_path_key(&right.file_path) {
            penalty
        } else {
            0.0
        }
    })
}

/// Maximal Marginal Relevance: repeatedly picks the candidate maximizing
/// `alpha * relevance - (1 - alpha) * max_similarity_to_selected`, where
/// relevance is the score normalized by the pool maximum. Ties go to the
/// earlier candidate. Stops at `k` or when the pool is exhausted.
pub fn rerank_with<F>(
    candidates: Vec<RetrievalCandidate>,
    alpha: f64,
    k: usize,
    similarity: F,
) -> Vec<RetrievalCandidate>
where
    F: Fn(&RetrievalCandidate, &RetrievalCandidate) -> f64,
{
    let alpha = if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) };
    let target = k.min(candidates.len());
    if target == 0 {
        return Vec::new();
    }

    let best = candidates
        .iter()
        .map(|candidate| candidate.score)
        .filter(|score| score.is_finite())
        .fold(0.0_f64, f64::max);
    let relevance = candidates
        .iter()
        .map(|candidate| {
            if best > 0.0 && candidate.score.is_finite() {
                candidate.score / best
            } else {
                0.0
            }
        })
        .collect::<Vec<f64>>();

    let mut remaining = (0..candidates.len()).collect::<Vec<usize>>();
    let mut selected = Vec::<usize>::with_capacity(target);

    while selected.len() < target && !remaining.is_empty() {
        let mut pick = 0_usize;
        let mut pick_value = f64::NEG_INFINITY;

        for (position, slot) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|chosen| similarity(&candidates[*slot], &candidates[*chosen]))
                .fold(0.0_f64, f64::max);
            let value = alpha * relevance[*slot] - (1.0 - alpha) * redundancy;
            if value > pick_value {
                pick = position;
                pick_value = value;
            }
        }

        selected.push(remaining.remove(pick));
    }

    let mut pool = candidates.into_iter().map(Some).collect::<Vec<Option<RetrievalCandidate>>>();
    selected
        .into_iter()
        .filter_map(|slot| pool[slot].take())
        .collect()
}

/// Keeps at most `cap_n` candidates per source file, preserving order.
/// A cap of zero keeps nothing.
pub fn cap(candidates: Vec<RetrievalCandidate>, cap_n: usize) -> Vec<RetrievalCandidate> {
    if cap_n == 0 {
        return Vec::new();
    }

    let mut per_file = HashMap::<String, usize>::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            let seen = per_file
                .entry(normalize_path_key(&candidate.file_path))
                .or_insert(0);
            if *seen >= cap_n {
                return false;
            }
            *seen += 1;
            true
        })
        .collect()
}
