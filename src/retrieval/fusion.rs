use super::*;

/// `w_path·s_path + w_short·s_short + w_title·s_title + w_bm25·s_bm25 + w_vec·s_vec`.
pub fn fused_score(weights: &WeightVector, candidate: &RetrievalCandidate) -> f64 {
    weights.w_path * candidate.s_path
        + weights.w_short * candidate.s_short
        + weights.w_title * candidate.s_title
        + weights.w_bm25 * candidate.s_bm25
        + weights.w_vec * candidate.s_vec
}

/// Accumulates channel rows into retrieval units in first-seen order.
#[derive(Debug, Default)]
pub(super) struct Fusion {
    units: Vec<RetrievalCandidate>,
    by_key: HashMap<String, usize>,
    path_scores: HashMap<String, f64>,
}

impl Fusion {
    pub(super) fn absorb(&mut self, channel: Channel, rows: Vec<IndexRow>) {
        for row in rows {
            let score = if row.score.is_finite() {
                row.score.clamp(0.0, 1.0)
            } else {
                0.0
            };

            if channel == Channel::Path {
                let file_key = normalize_path_key(&row.file_path);
                let best = self.path_scores.entry(file_key).or_insert(0.0);
                *best = best.max(score);
            }

            let slot = self.unit_slot(&row);
            let unit = &mut self.units[slot];
            let component = match channel {
                Channel::Path => &mut unit.s_path,
                Channel::Short => &mut unit.s_short,
                Channel::Title => &mut unit.s_title,
                Channel::Bm25 => &mut unit.s_bm25,
                Channel::Vector => &mut unit.s_vec,
            };
            *component = component.max(score);

            if unit.snippet.is_none() {
                unit.snippet = row.snippet;
            }
            if row.modified_at > unit.modified_at {
                unit.modified_at = row.modified_at;
            }
        }
    }

    fn unit_slot(&mut self, row: &IndexRow) -> usize {
        let key = match row.chunk_id.as_deref() {
            Some(chunk_id) => format!("chunk:{chunk_id}"),
            None => format!(
                "file:{}#{}",
                normalize_path_key(&row.file_path),
                row.chunk_index.unwrap_or(0)
            ),
        };

        if let Some(slot) = self.by_key.get(&key) {
            return *slot;
        }

        let slot = self.units.len();
        self.units.push(RetrievalCandidate {
            file_path: row.file_path.clone(),
            chunk_id: row.chunk_id.clone(),
            chunk_index: row.chunk_index,
            ..RetrievalCandidate::default()
        });
        self.by_key.insert(key, slot);
        slot
    }

    /// Path scores are file-level: every unit of a file carries the file's
    /// best path score.
    pub(super) fn into_candidates(self) -> Vec<RetrievalCandidate> {
        let Fusion {
            mut units,
            path_scores,
            ..
        } = self;

        for unit in units.iter_mut() {
            if let Some(score) = path_scores.get(&normalize_path_key(&unit.file_path)) {
                unit.s_path = unit.s_path.max(*score);
            }
        }
        units
    }
}
