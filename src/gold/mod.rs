use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::model::RetrievalCandidate;
use crate::util::normalize_path_key;


static SHARED_REGISTRIES: RwLock<Option<HashMap<PathBuf, Arc<GoldRegistry>>>> =
    RwLock::new(None);

#[derive(Debug, Clone, Deserialize)]
struct GoldRecord {
    #[serde(alias = "id", alias = "qid")]
    case_id: String,
    #[serde(default, alias = "paths", alias = "gold_paths")]
    file_paths: Vec<String>,
    #[serde(default, alias = "patterns")]
    globs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GoldRule {
    pub file_paths: HashSet<String>,
    pub globs: Vec<String>,
    matchers: Vec<GlobMatcher>,
}

impl PartialEq for GoldRule {
    fn eq(&self, other: &Self) -> bool {
        self.file_paths == other.file_paths && self.globs == other.globs
    }
}

impl GoldRule {
    fn new(case_id: &str, file_paths: &[String], globs: &[String]) -> Self {
        let mut rule = Self {
            file_paths: HashSet::new(),
            globs: Vec::new(),
            matchers: Vec::new(),
        };
        rule.extend(case_id, file_paths, globs);
        rule
    }

    fn extend(&mut self, case_id: &str, file_paths: &[String], globs: &[String]) {
        for path in file_paths {
            let normalized = normalize_path_key(path);
            if !normalized.is_empty() {
                self.file_paths.insert(normalized);
            }
        }

        for pattern in globs {
            let normalized = normalize_path_key(pattern);
            if normalized.is_empty() || self.globs.contains(&normalized) {
                continue;
            }
            match GlobBuilder::new(&normalized)
                .case_insensitive(true)
                .build()
            {
                Ok(glob) => {
                    self.matchers.push(glob.compile_matcher());
                    self.globs.push(normalized);
                }
                Err(err) => {
                    warn!(case_id = %case_id, pattern = %pattern, error = %err, "skipping invalid gold glob");
                }
            }
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let normalized = normalize_path_key(path);
        if normalized.is_empty() {
            return false;
        }
        if self.file_paths.contains(&normalized) {
            return true;
        }
        self.matchers
            .iter()
            .any(|matcher| matcher.is_match(&normalized))
    }
}

/// Anything that can be judged against a gold rule: fused candidates, or the
/// bare path lists older callers pass.
pub trait HitCandidate {
    fn candidate_path(&self) -> &str;
}

impl HitCandidate for RetrievalCandidate {
    fn candidate_path(&self) -> &str {
        &self.file_path
    }
}

impl HitCandidate for String {
    fn candidate_path(&self) -> &str {
        self
    }
}

impl HitCandidate for &str {
    fn candidate_path(&self) -> &str {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldRegistry {
    rules: BTreeMap<String, GoldRule>,
}

impl GoldRegistry {
    /// Reads a gold source. A missing or unreadable file yields an empty
    /// registry so a batch degrades to "no hits" instead of aborting.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "gold source unreadable; using empty registry");
                Self::default()
            }
        }
    }

    /// Loads `primary`, or the legacy mapping at `legacy` when `primary` is absent.
    pub fn load_with_fallback(primary: &Path, legacy: Option<&Path>) -> Self {
        if primary.exists() {
            return Self::load(primary);
        }

        match legacy {
            Some(legacy) if legacy.exists() => match fs::read_to_string(legacy) {
                Ok(raw) => {
                    info!(path = %legacy.display(), "primary gold source missing; loading legacy mapping");
                    Self::parse_legacy(&raw)
                }
                Err(err) => {
                    warn!(path = %legacy.display(), error = %err, "legacy gold source unreadable; using empty registry");
                    Self::default()
                }
            },
            _ => {
                warn!(path = %primary.display(), "gold source missing; using empty registry");
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut registry = Self::default();
        let trimmed = raw.trim_start();
        if (trimmed.starts_with('[') || trimmed.starts_with('{'))
            && let Some(records) = parse_document(raw)
        {
            for record in records {
                registry.insert(record);
            }
            return registry;
        }

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<GoldRecord>(line) {
                Ok(record) => registry.insert(record),
                Err(err) => {
                    warn!(line = line_no + 1, error = %err, "skipping malformed gold record");
                }
            }
        }
        registry
    }

    /// Legacy shape: `{"case_id": ["path", "glob/*", ...]}`.
    pub fn parse_legacy(raw: &str) -> Self {
        let mut registry = Self::default();
        let mapping = match serde_json::from_str::<BTreeMap<String, Vec<String>>>(raw) {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!(error = %err, "legacy gold mapping is malformed; using empty registry");
                return registry;
            }
        };

        for (case_id, entries) in mapping {
            let (globs, file_paths): (Vec<String>, Vec<String>) = entries
                .into_iter()
                .partition(|entry| entry.contains(['*', '?', '[']));
            registry.insert(GoldRecord {
                case_id,
                file_paths,
                globs,
            });
        }
        registry
    }

    fn insert(&mut self, record: GoldRecord) {
        let case_id = record.case_id.trim().to_string();
        if case_id.is_empty() {
            warn!("skipping gold record without case_id");
            return;
        }

        match self.rules.get_mut(&case_id) {
            Some(rule) => rule.extend(&case_id, &record.file_paths, &record.globs),
            None => {
                let rule = GoldRule::new(&case_id, &record.file_paths, &record.globs);
                self.rules.insert(case_id, rule);
            }
        }
    }

    pub fn rule(&self, case_id: &str) -> Option<&GoldRule> {
        self.rules.get(case_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_hit<C: HitCandidate>(&self, case_id: &str, candidates: &[C]) -> bool {
        if candidates.is_empty() {
            return false;
        }
        let Some(rule) = self.rules.get(case_id) else {
            return false;
        };
        candidates
            .iter()
            .any(|candidate| rule.matches(candidate.candidate_path()))
    }
}

/// Whole-document forms: a JSON array of records, an object with a `cases`
/// array, or a single record object. Elements are decoded one at a time so a
/// malformed record is skipped instead of sinking the document. `None` when
/// `raw` is not a single JSON value.
fn parse_document(raw: &str) -> Option<Vec<GoldRecord>> {
    let document = serde_json::from_str::<Value>(raw).ok()?;
    let elements = match document {
        Value::Array(elements) => elements,
        Value::Object(mut object) => match object.remove("cases") {
            Some(Value::Array(elements)) => elements,
            Some(cases) => {
                object.insert("cases".to_string(), cases);
                vec![Value::Object(object)]
            }
            None => vec![Value::Object(object)],
        },
        _ => return None,
    };

    let records = elements
        .into_iter()
        .enumerate()
        .filter_map(|(position, element)| match serde_json::from_value::<GoldRecord>(element) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(record = position + 1, error = %err, "skipping malformed gold record");
                None
            }
        })
        .collect();
    Some(records)
}

/// Process-wide registry for `primary`, loaded on first use. Empty results
/// (missing sources) are not memoized.
pub fn shared(primary: &Path, legacy: Option<&Path>) -> Arc<GoldRegistry> {
    if let Some(registry) = SHARED_REGISTRIES
        .read()
        .as_ref()
        .and_then(|cache| cache.get(primary))
    {
        return Arc::clone(registry);
    }

    let mut guard = SHARED_REGISTRIES.write();
    let cache = guard.get_or_insert_with(HashMap::new);
    if let Some(registry) = cache.get(primary) {
        return Arc::clone(registry);
    }

    let registry = Arc::new(GoldRegistry::load_with_fallback(primary, legacy));
    if !registry.is_empty() {
        info!(path = %primary.display(), cases = registry.len(), "gold registry loaded");
        cache.insert(primary.to_path_buf(), Arc::clone(&registry));
    }
    registry
}

/// Drops the memoized registry for `primary` and loads it again.
pub fn refresh(primary: &Path, legacy: Option<&Path>) -> Arc<GoldRegistry> {
    if let Some(cache) = SHARED_REGISTRIES.write().as_mut() {
        cache.remove(primary);
    }
    shared(primary, legacy)
}
