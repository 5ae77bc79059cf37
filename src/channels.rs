use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::UNTAGGED;
use crate::util::condense_whitespace;

const SHORT_QUERY_MAX_TERMS: usize = 6;
const TITLE_QUERY_MAX_TERMS: usize = 4;
const TITLE_TERM_MIN_CHARS: usize = 4;

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for",
    "from", "how", "i", "in", "is", "it", "me", "of", "on", "or", "should", "show", "that",
    "the", "this", "to", "we", "what", "when", "where", "which", "who", "why", "with", "you",
];

const MAX_EXTENSION_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelQuerySet {
    pub short: String,
    pub title: String,
    pub bm25: String,
    pub fname_regex: Option<String>,
    pub cold_start: bool,
}

/// Derives every channel's query text from `(query, tag)` alone.
/// `tuned_tags` lists tags with a stored weight or limit override.
pub fn build_channel_queries(query: &str, tag: &str, tuned_tags: &BTreeSet<String>) -> ChannelQuerySet {
    let bm25 = condense_whitespace(query);
    let terms = significant_terms(&bm25);

    let short = if terms.is_empty() {
        bm25.to_lowercase()
    } else {
        terms
            .iter()
            .take(SHORT_QUERY_MAX_TERMS)
            .cloned()
            .collect::<Vec<String>>()
            .join(" ")
    };

    let title_terms = terms
        .iter()
        .filter(|term| term.chars().count() >= TITLE_TERM_MIN_CHARS)
        .take(TITLE_QUERY_MAX_TERMS)
        .cloned()
        .collect::<Vec<String>>();
    let title = if title_terms.is_empty() {
        short.clone()
    } else {
        title_terms.join(" ")
    };

    let tag = tag.trim();
    let cold_start = tag.is_empty() || tag == UNTAGGED || !tuned_tags.contains(tag);

    ChannelQuerySet {
        short,
        title,
        bm25,
        fname_regex: filename_hint_regex(query),
        cold_start,
    }
}

fn significant_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::<String>::new();
    for raw in text.split(|character: char| !(character.is_alphanumeric() || character == '_')) {
        let term = raw.to_lowercase();
        if term.is_empty() || STOPWORDS.contains(&term.as_str()) || terms.contains(&term) {
            continue;
        }
        terms.push(term);
    }
    terms
}

/// Builds a case-insensitive pattern anchored at a path boundary for every
/// file-name-like token (`retry.rs`, `docs/setup.md`, `` `Cargo.toml` ``).
pub fn filename_hint_regex(query: &str) -> Option<String> {
    let mut names = Vec::<String>::new();
    for raw in query.split_whitespace() {
        let token = raw
            .trim_matches(|character: char| !(character.is_alphanumeric() || character == '_'))
            .trim_matches('/');
        if !looks_like_file_name(token) {
            continue;
        }
        let name = token.replace('\\', "/").to_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        return None;
    }

    let alternatives = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<String>>()
        .join("|");
    Some(format!("(?i)(^|/)({alternatives})$"))
}

fn looks_like_file_name(token: &str) -> bool {
    let Some((stem, extension)) = token.rsplit_once('.') else {
        return false;
    };
    let file_stem = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
    let stem_ok = file_stem
        .chars()
        .all(|character| character.is_alphanumeric() || matches!(character, '_' | '-' | '.'))
        && file_stem.chars().any(|character| character.is_alphabetic() || character == '_');
    let extension_ok = extension.chars().count() <= MAX_EXTENSION_CHARS
        && extension.chars().next().is_some_and(char::is_alphabetic)
        && extension.chars().all(char::is_alphanumeric);
    // Rejects abbreviations such as `e.g` and `i.e`.
    let long_enough = extension.chars().count() >= 2 || file_stem.chars().count() > 1;
    stem_ok && extension_ok && long_enough
}
