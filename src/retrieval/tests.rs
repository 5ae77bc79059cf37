use proptest::prelude::*;

use super::*;
use crate::index::fake::{FakeIndex, row};

fn queries(cold_start: bool, fname_regex: Option<&str>) -> ChannelQuerySet {
    ChannelQuerySet {
        short: "retry policy".to_string(),
        title: "retry policy".to_string(),
        bm25: "how does the retry policy work".to_string(),
        fname_regex: fname_regex.map(str::to_string),
        cold_start,
    }
}

fn weights(w_path: f64, w_short: f64, w_bm25: f64, w_vec: f64) -> WeightVector {
    WeightVector {
        w_path,
        w_short,
        w_title: 0.0,
        w_bm25,
        w_vec,
        adjacency_db: false,
        per_file_cap: 2,
    }
}

fn dated(file_path: &str, chunk_id: &str, score: f64, modified_at: Option<i64>) -> IndexRow {
    IndexRow {
        modified_at,
        ..row(file_path, chunk_id, 0, score)
    }
}

fn score_of(candidates: &[RetrievalCandidate], chunk_id: &str) -> f64 {
    candidates
        .iter()
        .find(|candidate| candidate.chunk_id.as_deref() == Some(chunk_id))
        .map(|candidate| candidate.score)
        .expect("candidate should be returned")
}

fn neighbor_index(neighbor_scores: [f64; 3], own_score: f64) -> FakeIndex {
    FakeIndex::new().with_rows(
        Channel::Bm25,
        "",
        vec![
            row("docs/g.md", "g-0", 0, neighbor_scores[0]),
            row("docs/h.md", "h-0", 0, neighbor_scores[1]),
            row("docs/f.md", "f-0", 0, neighbor_scores[2]),
            row("docs/f.md", "f-1", 1, own_score),
        ],
    )
}

#[test]
fn fused_score_is_weighted_sum_with_breakdown() {
    let index = FakeIndex::new()
        .with_rows(Channel::Short, "", vec![row("docs/a.md", "a-0", 0, 0.4)])
        .with_rows(
            Channel::Bm25,
            "",
            vec![row("docs/a.md", "a-0", 0, 1.0), row("docs/b.md", "b-0", 0, 0.5)],
        )
        .with_rows(Channel::Vector, "", vec![row("docs/b.md", "b-0", 0, 0.8)]);
    let set = queries(false, None);
    let weights = weights(0.0, 1.0, 2.0, 0.5);
    let request = RetrievalRequest::new(&set, &weights, 5);

    let candidates = retrieve(&index, &request, &AdjacencyPolicy::default());
    assert_eq!(candidates.len(), 2);

    let first = &candidates[0];
    assert_eq!(first.chunk_id.as_deref(), Some("a-0"));
    assert_eq!(first.s_short, 0.4);
    assert_eq!(first.s_bm25, 1.0);
    assert_eq!(first.s_vec, 0.0);
    assert!((first.score - 2.4).abs() < 1e-9);

    let second = &candidates[1];
    assert_eq!(second.chunk_id.as_deref(), Some("b-0"));
    assert!((second.score - 1.4).abs() < 1e-9);
}

#[test]
fn path_score_applies_to_every_chunk_of_the_file() {
    let index = FakeIndex::new()
        .with_rows(Channel::Path, "", vec![row("src/auth/token.rs", "t-0", 0, 1.0)])
        .with_rows(Channel::Bm25, "", vec![row("SRC/auth/token.rs", "t-3", 3, 0.5)]);
    let set = queries(false, None);
    let weights = weights(1.0, 0.0, 1.0, 0.0);
    let request = RetrievalRequest::new(&set, &weights, 5);

    let candidates = retrieve(&index, &request, &AdjacencyPolicy::default());
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].chunk_id.as_deref(), Some("t-3"));
    assert_eq!(candidates[0].s_path, 1.0);
    assert!((candidates[0].score - 1.5).abs() < 1e-9);
    assert_eq!(candidates[1].chunk_id.as_deref(), Some("t-0"));
}

#[test]
fn failed_channel_contributes_zero_without_aborting() {
    let index = FakeIndex::new()
        .with_rows(Channel::Bm25, "", vec![row("docs/a.md", "a-0", 0, 1.0)])
        .failing(Channel::Vector);
    let set = queries(false, None);
    let weights = weights(0.0, 0.0, 1.0, 1.0);
    let request = RetrievalRequest::new(&set, &weights, 5);

    let trace = retrieve_with_trace(&index, &request, &AdjacencyPolicy::default());
    assert_eq!(trace.failed, vec![Channel::Vector]);
    assert_eq!(trace.candidates.len(), 1);
    assert_eq!(trace.candidates[0].s_vec, 0.0);
    assert_eq!(trace.channel_rows.get(&Channel::Bm25), Some(&1));
}

#[test]
fn total_channel_failure_returns_empty_list() {
    let mut index = FakeIndex::new();
    for channel in Channel::ALL {
        index = index.failing(channel);
    }
    let set = queries(false, None);
    let weights = WeightVector::default();
    let request = RetrievalRequest::new(&set, &weights, 5);

    let trace = retrieve_with_trace(&index, &request, &AdjacencyPolicy::default());
    assert!(trace.candidates.is_empty());
    assert_eq!(trace.failed.len(), Channel::ALL.len());
}

#[test]
fn results_are_truncated_to_k_in_descending_order() {
    let rows = (0..6)
        .map(|slot| row(&format!("docs/{slot}.md"), &format!("c-{slot}"), 0, 0.1 * (slot as f64 + 1.0)))
        .collect::<Vec<IndexRow>>();
    let index = FakeIndex::new().with_rows(Channel::Bm25, "", rows);
    let set = queries(false, None);
    let weights = weights(0.0, 0.0, 1.0, 0.0);
    let request = RetrievalRequest::new(&set, &weights, 3);

    let candidates = retrieve(&index, &request, &AdjacencyPolicy::default());
    let ids = candidates
        .iter()
        .filter_map(|candidate| candidate.chunk_id.as_deref())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["c-5", "c-4", "c-3"]);
}

#[test]
fn ties_break_on_recency_then_first_seen_order() {
    let index = FakeIndex::new().with_rows(
        Channel::Bm25,
        "",
        vec![
            dated("docs/x.md", "x", 0.5, None),
            dated("docs/y.md", "y", 0.5, Some(10)),
            dated("docs/z.md", "z", 0.5, None),
            dated("docs/w.md", "w", 0.5, Some(20)),
        ],
    );
    let set = queries(false, None);
    let weights = weights(0.0, 0.0, 1.0, 0.0);
    let request = RetrievalRequest::new(&set, &weights, 10);

    let candidates = retrieve(&index, &request, &AdjacencyPolicy::default());
    let ids = candidates
        .iter()
        .filter_map(|candidate| candidate.chunk_id.as_deref())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["w", "y", "x", "z"]);
}

#[test]
fn cold_start_skips_title_and_unhinted_path_and_widens_fetch() {
    let index = FakeIndex::new();
    let set = queries(true, None);
    let weights = WeightVector::default();
    let request = RetrievalRequest::new(&set, &weights, 4);

    let trace = retrieve_with_trace(&index, &request, &AdjacencyPolicy::default());
    assert_eq!(trace.skipped, vec![Channel::Path, Channel::Title]);

    let calls = index.calls();
    let channels = calls.iter().map(|call| call.channel).collect::<Vec<Channel>>();
    assert_eq!(channels, vec![Channel::Short, Channel::Bm25, Channel::Vector]);
    assert!(calls.iter().all(|call| call.limit == 4 * CHANNEL_FETCH_FACTOR * 2));
}

#[test]
fn cold_start_keeps_path_channel_when_filename_hint_exists() {
    let index = FakeIndex::new();
    let set = queries(true, Some(r"(^|/)(retry\.rs)$"));
    let weights = WeightVector::default();
    let request = RetrievalRequest::new(&set, &weights, 4);

    let trace = retrieve_with_trace(&index, &request, &AdjacencyPolicy::default());
    assert_eq!(trace.skipped, vec![Channel::Title]);
    let path_call = index
        .calls()
        .into_iter()
        .find(|call| call.channel == Channel::Path)
        .expect("path channel should run");
    assert!(path_call.had_fname_regex);
}

#[test]
fn adjacency_boosts_neighbors_of_high_scoring_anchor() {
    let index = FakeIndex::new().with_rows(
        Channel::Bm25,
        "",
        vec![
            row("docs/guide.md", "g-2", 2, 1.0),
            row("docs/other.md", "o-0", 0, 0.3),
            row("docs/guide.md", "g-3", 3, 0.1),
            row("docs/guide.md", "g-5", 5, 0.2),
        ],
    );
    let set = queries(false, None);
    let mut weights = weights(0.0, 0.0, 1.0, 0.0);
    weights.adjacency_db = true;

    let boosted = retrieve(&index, &RetrievalRequest::new(&set, &weights, 10), &AdjacencyPolicy::default());
    let ids = boosted
        .iter()
        .filter_map(|candidate| candidate.chunk_id.as_deref())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["g-2", "o-0", "g-3", "g-5"]);
    let neighbor = &boosted[2];
    assert!((neighbor.s_adjacency - 0.15).abs() < 1e-9);
    assert!((neighbor.score - 0.25).abs() < 1e-9);

    weights.adjacency_db = false;
    let plain = retrieve(&index, &RetrievalRequest::new(&set, &weights, 10), &AdjacencyPolicy::default());
    let ids = plain
        .iter()
        .filter_map(|candidate| candidate.chunk_id.as_deref())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["g-2", "o-0", "g-5", "g-3"]);
    assert!(plain.iter().all(|candidate| candidate.s_adjacency == 0.0));
}

#[test]
fn adjacency_boost_decays_with_distance_and_keeps_largest() {
    let anchor = RetrievalCandidate {
        chunk_index: Some(0),
        score: 1.0,
        ..RetrievalCandidate::for_path("docs/a.md")
    };
    let near = RetrievalCandidate {
        chunk_index: Some(2),
        score: 0.0,
        ..RetrievalCandidate::for_path("docs/a.md")
    };
    let other_file = RetrievalCandidate {
        chunk_index: Some(1),
        score: 0.5,
        ..RetrievalCandidate::for_path("docs/b.md")
    };
    let policy = AdjacencyPolicy {
        boost: 0.2,
        radius: 2,
        decay: 0.5,
    };

    let boosts = adjacency_boosts(&[anchor, near, other_file], &policy);
    assert_eq!(boosts[0], 0.0);
    assert!((boosts[1] - 0.1).abs() < 1e-12);
    assert_eq!(boosts[2], 0.0);
}

#[test]
fn zero_k_issues_no_lookups() {
    let index = FakeIndex::new();
    let set = queries(false, None);
    let weights = WeightVector::default();
    let trace = retrieve_with_trace(&index, &RetrievalRequest::new(&set, &weights, 0), &AdjacencyPolicy::default());
    assert!(trace.candidates.is_empty());
    assert!(index.calls().is_empty());
}

#[test]
fn raising_a_neighbor_score_never_costs_its_adjacency_boost() {
    let set = queries(false, None);
    let mut weights = weights(0.0, 0.0, 2.0, 0.0);
    weights.adjacency_db = true;
    let request = RetrievalRequest::new(&set, &weights, 10);
    let policy = AdjacencyPolicy::default();

    let lower = retrieve(&neighbor_index([1.0, 1.0, 0.5], 0.45), &request, &policy);
    let higher = retrieve(&neighbor_index([1.0, 1.0, 0.5], 0.505), &request, &policy);

    let before = score_of(&lower, "f-1");
    let after = score_of(&higher, "f-1");
    assert!((before - 1.05).abs() < 1e-9);
    assert!((after - 1.16).abs() < 1e-9);
    assert!(after >= before);
}

proptest! {
    #[test]
    fn fused_score_never_drops_when_a_component_rises(
        multipliers in prop::array::uniform5(0.0_f64..5.0),
        components in prop::array::uniform5(0.0_f64..1.0),
        channel in 0_usize..5,
        bump in 0.0_f64..1.0,
    ) {
        let weights = WeightVector {
            w_path: multipliers[0],
            w_short: multipliers[1],
            w_title: multipliers[2],
            w_bm25: multipliers[3],
            w_vec: multipliers[4],
            ..WeightVector::default()
        };
        let candidate = RetrievalCandidate {
            s_path: components[0],
            s_short: components[1],
            s_title: components[2],
            s_bm25: components[3],
            s_vec: components[4],
            ..RetrievalCandidate::for_path("docs/a.md")
        };
        let mut raised = candidate.clone();
        match channel {
            0 => raised.s_path += bump,
            1 => raised.s_short += bump,
            2 => raised.s_title += bump,
            3 => raised.s_bm25 += bump,
            _ => raised.s_vec += bump,
        }

        prop_assert!(fused_score(&weights, &raised) >= fused_score(&weights, &candidate));
    }

    #[test]
    fn adjacency_boosted_score_never_drops_when_own_score_rises(
        neighbor_scores in prop::array::uniform3(0.0_f64..1.0),
        own_score in 0.0_f64..1.0,
        bump in 0.0_f64..1.0,
        w_bm25 in 0.0_f64..3.0,
        boost in 0.0_f64..0.5,
        radius in 1_u32..3,
        decay in 0.0_f64..1.0,
    ) {
        let set = queries(false, None);
        let mut weights = weights(0.0, 0.0, w_bm25, 0.0);
        weights.adjacency_db = true;
        let request = RetrievalRequest::new(&set, &weights, 10);
        let policy = AdjacencyPolicy { boost, radius, decay };

        let base = retrieve_with_trace(&neighbor_index(neighbor_scores, own_score), &request, &policy);
        let raised = retrieve_with_trace(&neighbor_index(neighbor_scores, own_score + bump), &request, &policy);

        prop_assert!(score_of(&raised.candidates, "f-1") >= score_of(&base.candidates, "f-1"));
    }
}
