use super::*;
use crate::gold::GoldRegistry;
use crate::index::Channel;
use crate::index::fake::{FakeIndex, row};

const GOLD: &str = r#"
{"case_id": "q1", "file_paths": ["docs/retry.md"]}
{"case_id": "q2", "file_paths": ["src/token.rs"]}
"#;

fn case(id: &str, query: &str, tag: &str) -> EvalCase {
    EvalCase {
        id: id.to_string(),
        query: query.to_string(),
        tag: tag.to_string(),
        query_vector: None,
    }
}

// Lexical evidence favors a distractor; only a heavier vector weight lifts
// the gold chunk of q1 above it. q2 behaves the other way round.
fn contested_index() -> FakeIndex {
    FakeIndex::new()
        .with_rows(Channel::Bm25, "retry", vec![row("docs/noise.md", "n-0", 0, 1.0)])
        .with_rows(Channel::Vector, "retry", vec![row("docs/retry.md", "r-0", 0, 0.85)])
        .with_rows(Channel::Bm25, "token", vec![row("src/token.rs", "t-0", 0, 1.0)])
        .with_rows(Channel::Vector, "token", vec![row("docs/noise2.md", "m-0", 0, 0.9)])
}

fn single_result_config() -> RankingConfig {
    serde_yaml::from_str("limits:\n  default:\n    shortlist: 10\n    topk: 1\n").expect("config should parse")
}

fn w_vec(value: f64) -> GridValue {
    GridValue::Number(value)
}

#[test]
fn parse_params_sorts_names_and_keeps_value_order() {
    let grid = Grid::parse_params(&[
        "w_vec=1.2,1.0".to_string(),
        "adjacency_db=true,false".to_string(),
    ])
    .expect("grid should parse");

    let names = grid.params().keys().cloned().collect::<Vec<String>>();
    assert_eq!(names, vec!["adjacency_db".to_string(), "w_vec".to_string()]);
    assert_eq!(grid.len(), 4);

    let combos = grid.combinations().expect("combinations should build");
    let pairs = combos
        .iter()
        .map(|patch| (patch.adjacency_db, patch.w_vec))
        .collect::<Vec<(Option<bool>, Option<f64>)>>();
    assert_eq!(
        pairs,
        vec![
            (Some(true), Some(1.2)),
            (Some(true), Some(1.0)),
            (Some(false), Some(1.2)),
            (Some(false), Some(1.0)),
        ]
    );
}

#[test]
fn grid_document_accepts_yaml_and_json() {
    let yaml = Grid::parse_document("w_bm25: [0.5, 1.0]\nper_file_cap: [1, 2, 3]\n").expect("yaml grid");
    assert_eq!(yaml.len(), 6);

    let json = Grid::parse_document(r#"{"w_title": [0.0, 0.25]}"#).expect("json grid");
    let combos = json.combinations().expect("combinations should build");
    assert_eq!(combos[1].w_title, Some(0.25));
}

#[test]
fn grid_rejects_unknown_and_ill_typed_parameters() {
    assert!(Grid::parse_params(&["w_magic=1.0".to_string()]).is_err());
    assert!(Grid::parse_params(&["adjacency_db=1.0".to_string()]).is_err());
    assert!(Grid::parse_params(&["w_vec=true".to_string()]).is_err());
    assert!(Grid::parse_params(&["w_vec=-0.5".to_string()]).is_err());
    assert!(Grid::parse_params(&["per_file_cap=1.5".to_string()]).is_err());
    assert!(Grid::parse_params(&["per_file_cap=0".to_string()]).is_err());
    assert!(Grid::parse_params(&["w_vec".to_string()]).is_err());
    assert!(Grid::parse_params(&["w_vec=".to_string()]).is_err());
    assert!(Grid::parse_params(&[]).is_err());
}

#[test]
fn search_prefers_the_vector_weight_that_adds_hits() {
    let index = contested_index();
    let gold = GoldRegistry::parse(GOLD);
    let config = single_result_config();
    let context = EvaluationContext::new(&index, &gold, &config, 1);
    let cases = vec![case("q1", "retry policy", "api")];

    let mut params = BTreeMap::new();
    params.insert("w_vec".to_string(), vec![w_vec(1.0), w_vec(1.2)]);
    let grid = Grid::from_map(params).expect("grid should build");

    let outcome = search(&context, &config, &grid, &cases, &SearchOptions::default())
        .expect("search should run");

    assert_eq!(outcome.baseline.hits, 0);
    assert_eq!(outcome.evaluated, 2);
    assert_eq!(outcome.discarded, 0);
    let winner = outcome.winner.expect("a winner should be selected");
    assert_eq!(winner.patch.w_vec, Some(1.2));
    assert_eq!(winner.weights.w_vec, 1.2);
    assert_eq!(winner.result.hits, 1);
    assert_eq!(outcome.improvement, 1);
    assert!(outcome.meets_min_delta);
}

#[test]
fn search_discards_combinations_below_the_tag_floor() {
    let index = contested_index();
    let gold = GoldRegistry::parse(GOLD);
    let config = single_result_config();
    let context = EvaluationContext::new(&index, &gold, &config, 1);
    let cases = vec![case("q1", "retry policy", "api"), case("q2", "token refresh", "ops")];
    let grid = Grid::parse_params(&["w_vec=1.0,1.2".to_string()]).expect("grid should parse");

    let strict = SearchOptions {
        min_tag_hit: 0.5,
        ..SearchOptions::default()
    };
    let outcome = search(&context, &config, &grid, &cases, &strict).expect("search should run");
    assert_eq!(outcome.discarded, 2);
    assert!(outcome.winner.is_none());
    assert!(!outcome.meets_min_delta);
    assert!(outcome.leaderboard.is_empty());

    let lenient = search(&context, &config, &grid, &cases, &SearchOptions::default())
        .expect("search should run");
    let winner = lenient.winner.expect("a winner should be selected");
    assert_eq!(winner.index, 0);
    assert_eq!(winner.patch.w_vec, Some(1.0));
    assert_eq!(lenient.leaderboard.len(), 2);
}

#[test]
fn search_restricted_to_a_tag_patches_that_tag_block() {
    let index = contested_index();
    let gold = GoldRegistry::parse(GOLD);
    let config = single_result_config();
    let context = EvaluationContext::new(&index, &gold, &config, 1);
    let cases = vec![case("q1", "retry policy", "api"), case("q2", "token refresh", "ops")];
    let grid = Grid::parse_params(&["w_vec=1.0,1.2".to_string()]).expect("grid should parse");

    let options = SearchOptions {
        tag_filter: Some("api"),
        min_delta: 2.0,
        ..SearchOptions::default()
    };
    let outcome = search(&context, &config, &grid, &cases, &options).expect("search should run");
    assert_eq!(outcome.target, "api");
    assert_eq!(outcome.cases, 1);
    assert_eq!(outcome.improvement, 1);
    assert!(!outcome.meets_min_delta);

    let missing = SearchOptions {
        tag_filter: Some("billing"),
        ..SearchOptions::default()
    };
    assert!(search(&context, &config, &grid, &cases, &missing).is_err());
}

#[test]
fn pooled_and_serial_search_agree() {
    let index = contested_index();
    let gold = GoldRegistry::parse(GOLD);
    let config = single_result_config();
    let context = EvaluationContext::new(&index, &gold, &config, 1);
    let cases = vec![case("q1", "retry policy", "api"), case("q2", "token refresh", "ops")];
    let grid = Grid::parse_params(&["w_vec=0.8,1.0,1.2".to_string(), "w_bm25=0.9,1.0".to_string()])
        .expect("grid should parse");

    let serial = SearchOptions {
        workers: 1,
        ..SearchOptions::default()
    };
    let first = search(&context, &config, &grid, &cases, &serial).expect("serial search should run");
    let second = search(&context, &config, &grid, &cases, &SearchOptions::default())
        .expect("pooled search should run");
    assert_eq!(first.winner, second.winner);
    assert_eq!(first.leaderboard, second.leaderboard);
}
