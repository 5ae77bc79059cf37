use rusqlite::Connection;
use tempfile::TempDir;

use super::sqlite::fixtures::{SCHEMA_SQL, insert_chunk};
use super::*;

const DIM: usize = 64;

fn seeded_index() -> (TempDir, SqliteIndex) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let db_path = dir.path().join("index.sqlite");
    let connection = Connection::open(&db_path).expect("index db should open");
    connection
        .execute_batch(SCHEMA_SQL)
        .expect("schema should apply");

    insert_chunk(
        &connection,
        "retry-0",
        "docs/retry_policy.md",
        0,
        "Retry policy",
        "Uploads are retried with exponential backoff and jitter.",
        DIM,
    );
    insert_chunk(
        &connection,
        "retry-1",
        "docs/retry_policy.md",
        1,
        "Retry limits",
        "The maximum number of attempts is five.",
        DIM,
    );
    insert_chunk(
        &connection,
        "auth-0",
        "src/auth/token.rs",
        0,
        "Token refresh",
        "Access tokens are refreshed before expiry.",
        DIM,
    );
    drop(connection);

    let index = SqliteIndex::new(db_path);
    (dir, index)
}

fn lookup(channel: Channel, text: &str) -> ChannelLookup<'_> {
    ChannelLookup {
        channel,
        text,
        vector: None,
        fname_regex: None,
        limit: 10,
    }
}

#[test]
fn bm25_lookup_ranks_matching_chunks_with_normalized_scores() {
    let (_dir, index) = seeded_index();
    let rows = index
        .lookup(&lookup(Channel::Bm25, "exponential backoff for uploads"))
        .expect("bm25 lookup should succeed");

    assert_eq!(rows.first().map(|row| row.chunk_id.as_deref()), Some(Some("retry-0")));
    assert!((rows[0].score - 1.0).abs() < 1e-9);
    assert!(rows.iter().all(|row| (0.0..=1.0).contains(&row.score)));
}

#[test]
fn title_lookup_only_matches_title_column() {
    let (_dir, index) = seeded_index();
    let rows = index
        .lookup(&lookup(Channel::Title, "limits"))
        .expect("title lookup should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].chunk_id.as_deref(), Some("retry-1"));

    let body_only = index
        .lookup(&lookup(Channel::Title, "jitter"))
        .expect("title lookup should succeed");
    assert!(body_only.is_empty());
}

#[test]
fn path_lookup_prefers_filename_hint_match() {
    let (_dir, index) = seeded_index();
    let mut request = lookup(Channel::Path, "how does token refresh work");
    request.fname_regex = Some(r"(^|/)token\.rs$");
    let rows = index.lookup(&request).expect("path lookup should succeed");

    assert_eq!(rows[0].file_path, "src/auth/token.rs");
    assert_eq!(rows[0].score, 1.0);
    assert_eq!(rows[0].chunk_index, Some(0));
}

#[test]
fn path_lookup_scores_term_coverage_without_hint() {
    let (_dir, index) = seeded_index();
    let rows = index
        .lookup(&lookup(Channel::Path, "retry policy"))
        .expect("path lookup should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_path, "docs/retry_policy.md");
    assert_eq!(rows[0].score, 1.0);
}

#[test]
fn vector_lookup_embeds_query_text_when_vector_is_missing() {
    let (_dir, index) = seeded_index();
    let rows = index
        .lookup(&lookup(
            Channel::Vector,
            "Token refresh Access tokens are refreshed before expiry.",
        ))
        .expect("vector lookup should succeed");
    assert_eq!(rows[0].chunk_id.as_deref(), Some("auth-0"));
    assert!(rows[0].score > 0.99);
}

#[test]
fn vector_lookup_skips_rows_with_mismatched_dimensions() {
    let (_dir, index) = seeded_index();
    let short_vector = vec![1.0_f32; 3];
    let mut request = lookup(Channel::Vector, "anything");
    request.vector = Some(&short_vector);
    let rows = index.lookup(&request).expect("vector lookup should succeed");
    assert!(rows.is_empty());
}

#[test]
fn lookup_against_missing_database_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let index = SqliteIndex::new(dir.path().join("absent.sqlite"));
    assert!(index.lookup(&lookup(Channel::Bm25, "retry")).is_err());
}

#[test]
fn counts_report_files_chunks_and_embeddings() {
    let (_dir, index) = seeded_index();
    let counts = index.counts().expect("counts should load");
    assert_eq!(counts.files, 2);
    assert_eq!(counts.chunks, 3);
    assert_eq!(counts.embeddings, 3);
}
