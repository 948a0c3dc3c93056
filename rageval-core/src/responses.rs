//! Running a RAG pipeline over a test set to produce evaluation rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::dataset::{EvaluationRow, TestSetRow, write_csv};
use crate::error::{EvalError, Result};
use crate::literal::encode_string_list;

/// What a pipeline returns for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    /// Text of each retrieved source node, in rank order.
    pub source_texts: Vec<String>,
}

/// A RAG pipeline under test.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, query: &str) -> Result<QueryResponse>;
}

/// Ask `engine` every query of `test_set`, in order.
///
/// Answers are trimmed and retrieved texts are stored as a JSON-encoded list,
/// ready for [`crate::dataset::TestCase::from_row`].
pub async fn generate_responses(
    engine: &dyn QueryEngine,
    test_set: &[TestSetRow],
) -> Result<Vec<EvaluationRow>> {
    info!(queries = test_set.len(), "Generating responses");
    let mut rows = Vec::with_capacity(test_set.len());
    for (idx, item) in test_set.iter().enumerate() {
        let reply = engine.query(&item.query).await?;
        debug!(row = idx, sources = reply.source_texts.len(), "Query answered");
        rows.push(EvaluationRow {
            query: item.query.clone(),
            answer: reply.response.trim().to_string(),
            contexts: encode_string_list(&reply.source_texts),
            reference_answer: item.reference_answer.clone(),
        });
    }
    Ok(rows)
}

#[derive(Serialize)]
struct ResponseRecord<'a> {
    query: &'a str,
    answer: &'a str,
    contexts: &'a str,
    ground_truth: &'a str,
}

/// Write generated rows as CSV with a `ground_truth` column.
pub fn write_responses(path: &Path, rows: &[EvaluationRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(EvalError::invalid_input("no responses to write"));
    }
    let records: Vec<ResponseRecord<'_>> = rows
        .iter()
        .map(|r| ResponseRecord {
            query: &r.query,
            answer: &r.answer,
            contexts: &r.contexts,
            ground_truth: &r.reference_answer,
        })
        .collect();
    write_csv(path, &records)
}
