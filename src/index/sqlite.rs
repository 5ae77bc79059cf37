//! SQLite-backed chunk index.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE chunks (
//!   chunk_id TEXT PRIMARY KEY,
//!   file_path TEXT NOT NULL,
//!   chunk_index INTEGER NOT NULL,
//!   title TEXT,
//!   text TEXT NOT NULL,
//!   modified_at INTEGER
//! );
//! CREATE VIRTUAL TABLE chunks_fts USING fts5(chunk_id UNINDEXED, title, text);
//! CREATE TABLE chunk_embeddings (
//!   chunk_id TEXT PRIMARY KEY,
//!   embedding BLOB NOT NULL,
//!   embedding_dim INTEGER NOT NULL
//! );
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::RegexBuilder;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;

use super::{Channel, ChannelLookup, ChunkIndex, IndexRow};
use crate::semantic::{cosine_similarity, decode_embedding_blob, embed_text_local};

const SNIPPET_TOKENS: i64 = 12;

#[derive(Debug, Clone)]
pub struct SqliteIndex {
    db_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexCounts {
    pub files: i64,
    pub chunks: i64,
    pub embeddings: i64,
}

impl SqliteIndex {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // One read-only connection per lookup; workers never share a handle.
    fn open(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| {
            format!(
                "failed to open index database read-only: {}",
                self.db_path.display()
            )
        })
    }

    pub fn counts(&self) -> Result<IndexCounts> {
        let connection = self.open()?;
        let (files, chunks): (i64, i64) = connection.query_row(
            "SELECT COUNT(DISTINCT file_path), COUNT(*) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let embeddings = if table_exists(&connection, "chunk_embeddings")? {
            connection.query_row("SELECT COUNT(*) FROM chunk_embeddings", [], |row| {
                row.get(0)
            })?
        } else {
            0
        };

        Ok(IndexCounts {
            files,
            chunks,
            embeddings,
        })
    }
}

impl ChunkIndex for SqliteIndex {
    fn lookup(&self, lookup: &ChannelLookup<'_>) -> Result<Vec<IndexRow>> {
        let connection = self.open()?;
        match lookup.channel {
            Channel::Path => path_lookup(&connection, lookup),
            Channel::Short | Channel::Bm25 => {
                fts_lookup(&connection, &to_fts_query(lookup.text), lookup.limit)
            }
            Channel::Title => {
                let expression = to_fts_query(lookup.text);
                if expression.is_empty() {
                    return Ok(Vec::new());
                }
                fts_lookup(&connection, &format!("title : ({expression})"), lookup.limit)
            }
            Channel::Vector => vector_lookup(&connection, lookup),
        }
    }
}

fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let exists = connection
        .query_row(
            "
            SELECT 1
            FROM sqlite_master
            WHERE type IN ('table', 'view') AND name = ?1
            LIMIT 1
            ",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

fn to_fts_query(text: &str) -> String {
    query_terms(text)
        .into_iter()
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<String>>()
        .join(" OR ")
}

fn query_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::<String>::new();
    for token in text.split(|character: char| !character.is_alphanumeric()) {
        let token = token.to_lowercase();
        if token.chars().count() < 2 || terms.contains(&token) {
            continue;
        }
        terms.push(token);
    }
    terms
}

fn fts_lookup(connection: &Connection, match_expression: &str, limit: usize) -> Result<Vec<IndexRow>> {
    if match_expression.trim().is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut statement = connection.prepare(
        "
        SELECT
          c.chunk_id,
          c.file_path,
          c.chunk_index,
          c.modified_at,
          snippet(chunks_fts, 2, '[', ']', ' ... ', ?3),
          bm25(chunks_fts) AS rank
        FROM chunks_fts
        JOIN chunks c ON c.chunk_id = chunks_fts.chunk_id
        WHERE chunks_fts MATCH ?1
        ORDER BY rank ASC, c.chunk_id ASC
        LIMIT ?2
        ",
    )?;

    let mut rows = statement.query(params![match_expression, limit as i64, SNIPPET_TOKENS])?;
    let mut out = Vec::<IndexRow>::new();
    while let Some(row) = rows.next()? {
        // bm25() is negative; larger magnitude ranks higher.
        let raw = -row.get::<_, f64>(5)?;
        out.push(IndexRow {
            chunk_id: Some(row.get(0)?),
            file_path: row.get(1)?,
            chunk_index: row.get(2)?,
            modified_at: row.get(3)?,
            snippet: row.get(4)?,
            score: raw.max(0.0),
        });
    }

    normalize_by_best(&mut out);
    Ok(out)
}

fn vector_lookup(connection: &Connection, lookup: &ChannelLookup<'_>) -> Result<Vec<IndexRow>> {
    if lookup.limit == 0 {
        return Ok(Vec::new());
    }

    let mut statement = connection.prepare(
        "
        SELECT
          c.chunk_id,
          c.file_path,
          c.chunk_index,
          c.modified_at,
          substr(c.text, 1, 160),
          ce.embedding,
          ce.embedding_dim
        FROM chunk_embeddings ce
        JOIN chunks c ON c.chunk_id = ce.chunk_id
        ",
    )?;

    let mut local_query = None::<Vec<f32>>;
    let mut rows = statement.query([])?;
    let mut out = Vec::<IndexRow>::new();
    while let Some(row) = rows.next()? {
        let row_dim = row.get::<_, i64>(6)? as usize;
        let query = match lookup.vector {
            Some(vector) => vector,
            None => local_query
                .get_or_insert_with(|| embed_text_local(lookup.text, row_dim))
                .as_slice(),
        };
        if query.len() != row_dim {
            continue;
        }

        let blob = row.get::<_, Vec<u8>>(5)?;
        let Some(embedding) = decode_embedding_blob(&blob, row_dim) else {
            continue;
        };

        let similarity = cosine_similarity(query, &embedding);
        if similarity <= 0.0 {
            continue;
        }

        out.push(IndexRow {
            chunk_id: Some(row.get(0)?),
            file_path: row.get(1)?,
            chunk_index: row.get(2)?,
            modified_at: row.get(3)?,
            snippet: row.get(4)?,
            score: similarity.min(1.0),
        });
    }

    out.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.chunk_id.cmp(&right.chunk_id))
    });
    out.truncate(lookup.limit);
    Ok(out)
}

fn path_lookup(connection: &Connection, lookup: &ChannelLookup<'_>) -> Result<Vec<IndexRow>> {
    let terms = query_terms(lookup.text);
    let fname_matcher = match lookup.fname_regex {
        Some(pattern) => Some(
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid filename hint pattern: {pattern}"))?,
        ),
        None => None,
    };
    if terms.is_empty() && fname_matcher.is_none() {
        return Ok(Vec::new());
    }

    let mut statement = connection.prepare(
        "
        SELECT c.chunk_id, c.file_path, c.chunk_index, c.modified_at
        FROM chunks c
        WHERE c.chunk_index = (
          SELECT MIN(inner_c.chunk_index) FROM chunks inner_c WHERE inner_c.file_path = c.file_path
        )
        ORDER BY c.file_path ASC, c.chunk_id ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::<IndexRow>::new();
    while let Some(row) = rows.next()? {
        let file_path: String = row.get(1)?;
        if out.last().is_some_and(|last| last.file_path == file_path) {
            continue;
        }

        let normalized = file_path.replace('\\', "/");
        let score = if fname_matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(&normalized))
        {
            1.0
        } else {
            path_term_coverage(&normalized, &terms)
        };
        if score <= 0.0 {
            continue;
        }

        out.push(IndexRow {
            chunk_id: Some(row.get(0)?),
            file_path,
            chunk_index: row.get(2)?,
            modified_at: row.get(3)?,
            snippet: None,
            score,
        });
    }

    out.sort_by(|left, right| right.score.total_cmp(&left.score));
    out.truncate(lookup.limit);
    Ok(out)
}

fn path_term_coverage(path: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let segments = path
        .to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect::<Vec<String>>();
    let matched = terms
        .iter()
        .filter(|term| segments.iter().any(|segment| segment == *term))
        .count();
    matched as f64 / terms.len() as f64
}

fn normalize_by_best(rows: &mut [IndexRow]) {
    let best = rows.iter().map(|row| row.score).fold(0.0_f64, f64::max);
    for row in rows.iter_mut() {
        row.score = if best > 0.0 { row.score / best } else { 0.0 };
    }
}

#[cfg(test)]
pub(super) mod fixtures {
    use super::*;
    use crate::semantic::encode_embedding_blob;

    pub const SCHEMA_SQL: &str = "
        CREATE TABLE chunks (
          chunk_id TEXT PRIMARY KEY,
          file_path TEXT NOT NULL,
          chunk_index INTEGER NOT NULL,
          title TEXT,
          text TEXT NOT NULL,
          modified_at INTEGER
        );
        CREATE VIRTUAL TABLE chunks_fts USING fts5(chunk_id UNINDEXED, title, text);
        CREATE TABLE chunk_embeddings (
          chunk_id TEXT PRIMARY KEY,
          embedding BLOB NOT NULL,
          embedding_dim INTEGER NOT NULL
        );
    ";

    pub fn insert_chunk(
        connection: &Connection,
        chunk_id: &str,
        file_path: &str,
        chunk_index: i64,
        title: &str,
        text: &str,
        embedding_dim: usize,
    ) {
        connection
            .execute(
                "INSERT INTO chunks(chunk_id, file_path, chunk_index, title, text, modified_at) VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                params![chunk_id, file_path, chunk_index, title, text, 1_700_000_000_i64 + chunk_index],
            )
            .expect("chunk row should insert");
        connection
            .execute(
                "INSERT INTO chunks_fts(chunk_id, title, text) VALUES(?1, ?2, ?3)",
                params![chunk_id, title, text],
            )
            .expect("fts row should insert");
        let embedding = embed_text_local(&format!("{title} {text}"), embedding_dim);
        connection
            .execute(
                "INSERT INTO chunk_embeddings(chunk_id, embedding, embedding_dim) VALUES(?1, ?2, ?3)",
                params![chunk_id, encode_embedding_blob(&embedding), embedding_dim as i64],
            )
            .expect("embedding row should insert");
    }
}
