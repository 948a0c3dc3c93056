//! Record and document filters used to clean question sets and corpora.
//!
//! Filters are pure: they take ownership of a list and return the retained
//! subsequence in the original order. Nothing here fails on dirty input;
//! dropping it is the point.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{EvalError, Result};

/// Anything carrying a query string.
pub trait Queried {
    fn query(&self) -> &str;
}

/// Anything carrying a body of text.
pub trait Textual {
    fn text(&self) -> &str;
}

/// A question record, typically produced by a test-set generator.
///
/// `query` is required; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl QueryRecord {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Queried for QueryRecord {
    fn query(&self) -> &str {
        &self.query
    }
}

/// A corpus document or node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

impl Textual for Document {
    fn text(&self) -> &str {
        &self.text
    }
}

/// Keep only records whose query contains a question mark.
pub fn remove_recs_without_query<R: Queried>(records: Vec<R>) -> Vec<R> {
    records
        .into_iter()
        .filter(|r| r.query().contains('?'))
        .collect()
}

/// Keep the first record for each distinct query. Comparison is exact.
pub fn remove_duplicated_queries<R: Queried>(records: Vec<R>) -> Vec<R> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.query().to_string()))
        .collect()
}

/// Indices of documents with fewer than `min_length` whitespace-separated words.
pub fn get_short_docs<D: Textual>(documents: &[D], min_length: usize) -> Vec<usize> {
    documents
        .iter()
        .enumerate()
        .filter(|(_, d)| d.text().split_whitespace().count() < min_length)
        .map(|(idx, _)| idx)
        .collect()
}

/// Indices of documents containing a NUL character, which PGVector rejects.
pub fn get_indices_with_nulls<D: Textual>(documents: &[D]) -> Vec<usize> {
    documents
        .iter()
        .enumerate()
        .filter(|(_, d)| d.text().contains('\0'))
        .map(|(idx, _)| idx)
        .collect()
}

/// Drop the elements at `indices`. Out-of-range and repeated indices are ignored.
pub fn remove_elements<T>(elements: Vec<T>, indices: &[usize]) -> Vec<T> {
    let to_remove: HashSet<usize> = indices.iter().copied().collect();
    elements
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !to_remove.contains(idx))
        .map(|(_, e)| e)
        .collect()
}

/// Undo PDF extraction artifacts: soft-hyphen line breaks, hard line breaks
/// and non-breaking spaces.
pub fn clean_text(text: &str) -> String {
    text.replace("\u{ad}\n", "")
        .replace('\n', " ")
        .replace('\u{a0}', " ")
}

/// Apply [`clean_text`] to every document in place.
pub fn clean_documents(documents: &mut [Document]) {
    for doc in documents.iter_mut() {
        doc.text = clean_text(&doc.text);
    }
}

/// Load a JSON array of records. Fails on the first entry without a `query` string.
pub fn load_records(path: &Path) -> Result<Vec<QueryRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            serde_json::from_value(value).map_err(|e| {
                EvalError::invalid_input(format!(
                    "record {} in {}: {}",
                    idx,
                    path.display(),
                    e
                ))
            })
        })
        .collect()
}

/// Write records as a pretty-printed JSON array.
pub fn save_records(path: &Path, records: &[QueryRecord]) -> Result<()> {
    let body = serde_json::to_string_pretty(records)?;
    std::fs::write(path, body)?;
    Ok(())
}
