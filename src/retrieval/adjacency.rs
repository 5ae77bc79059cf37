use super::*;

/// Locality boost per candidate, index-aligned with `candidates`.
///
/// Every candidate with a positive score acts as an anchor. A candidate from
/// the same file whose `chunk_index` is `d` away from an anchor
/// (`1 <= d <= radius`) earns `boost * anchor_score * decay^(d-1)`; the
/// largest boost across anchors is kept. A candidate's boost depends only on
/// its neighbours' scores, never on its own.
pub fn adjacency_boosts(candidates: &[RetrievalCandidate], policy: &AdjacencyPolicy) -> Vec<f64> {
    let mut boosts = vec![0.0_f64; candidates.len()];
    if candidates.is_empty() || policy.radius == 0 || policy.boost <= 0.0 {
        return boosts;
    }

    let file_keys = candidates
        .iter()
        .map(|candidate| normalize_path_key(&candidate.file_path))
        .collect::<Vec<String>>();

    for (anchor, anchor_candidate) in candidates.iter().enumerate() {
        let anchor_score = anchor_candidate.score;
        let Some(anchor_index) = anchor_candidate.chunk_index else {
            continue;
        };
        if anchor_score.is_nan() || anchor_score <= 0.0 {
            continue;
        }

        for (slot, candidate) in candidates.iter().enumerate() {
            if slot == anchor || file_keys[slot] != file_keys[anchor] {
                continue;
            }
            let Some(chunk_index) = candidate.chunk_index else {
                continue;
            };
            let distance = chunk_index.abs_diff(anchor_index);
            if distance == 0 || distance > u64::from(policy.radius) {
                continue;
            }

            let exponent = i32::try_from(distance - 1).unwrap_or(i32::MAX);
            let boost = policy.boost * anchor_score * policy.decay.powi(exponent);
            if boost > boosts[slot] {
                boosts[slot] = boost;
            }
        }
    }

    boosts
}
