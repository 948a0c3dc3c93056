//! Test sets on disk and the test cases built from them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EvalError, Result};
use crate::literal::{encode_string_list, parse_string_list};

/// One row of a test-set CSV: a query, the pipeline's answer, the contexts it
/// retrieved, and the ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub query: String,
    pub answer: String,
    /// String-encoded list of context passages.
    pub contexts: String,
    #[serde(alias = "ground_truth")]
    pub reference_answer: String,
}

/// A single evaluation unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    input: String,
    actual_output: String,
    expected_output: String,
    retrieval_context: Vec<String>,
    context: Vec<String>,
}

impl TestCase {
    pub fn new(
        input: impl Into<String>,
        actual_output: impl Into<String>,
        expected_output: impl Into<String>,
        retrieval_context: Vec<String>,
    ) -> Self {
        Self {
            input: input.into(),
            actual_output: actual_output.into(),
            expected_output: expected_output.into(),
            context: retrieval_context.clone(),
            retrieval_context,
        }
    }

    /// Build a test case from a CSV row, parsing its `contexts` cell.
    pub fn from_row(row: &EvaluationRow) -> std::result::Result<Self, crate::error::LiteralError> {
        let contexts = parse_string_list(&row.contexts)?;
        Ok(Self::new(
            row.query.clone(),
            row.answer.clone(),
            row.reference_answer.clone(),
            contexts,
        ))
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn actual_output(&self) -> &str {
        &self.actual_output
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn retrieval_context(&self) -> &[String] {
        &self.retrieval_context
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }
}

/// What to do with a row whose `contexts` cell does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Abort the dataset with [`EvalError::MalformedContext`].
    #[default]
    Fail,
    /// Log and drop the row.
    Skip,
}

/// Read up to `row_limit` rows from a test-set CSV, in file order.
pub fn load_eval_rows(path: &Path, row_limit: Option<usize>) -> Result<Vec<EvaluationRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?;
    let has = |name: &str| headers.iter().any(|h| h == name);
    if has("reference_answer") && has("ground_truth") {
        return Err(EvalError::invalid_input(format!(
            "{} has both 'reference_answer' and 'ground_truth' columns; keep only one",
            path.display()
        )));
    }

    let limit = row_limit.unwrap_or(usize::MAX);
    let rows = reader
        .deserialize()
        .take(limit)
        .collect::<std::result::Result<Vec<EvaluationRow>, csv::Error>>()?;

    debug!(path = %path.display(), rows = rows.len(), "Loaded test set");
    Ok(rows)
}

/// Convert rows into test cases.
pub fn assemble_test_cases(
    dataset: &str,
    rows: &[EvaluationRow],
    policy: MalformedRowPolicy,
) -> Result<Vec<TestCase>> {
    let mut cases = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        match TestCase::from_row(row) {
            Ok(case) => cases.push(case),
            Err(source) if policy == MalformedRowPolicy::Skip => {
                warn!(dataset, row = row_idx, error = %source, "Skipping row with malformed contexts");
            }
            Err(source) => {
                return Err(EvalError::MalformedContext {
                    dataset: dataset.to_string(),
                    row: row_idx,
                    source,
                });
            }
        }
    }
    Ok(cases)
}

/// A synthesized question with its expected answer and source passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Golden {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub context: Vec<String>,
}

/// A row of a generated test set, before any pipeline has answered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSetRow {
    pub query: String,
    pub reference_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_contexts: Option<String>,
}

/// Turn goldens into test-set rows. Contexts are JSON-encoded when requested.
pub fn goldens_to_rows(goldens: &[Golden], include_context: bool) -> Vec<TestSetRow> {
    goldens
        .iter()
        .map(|g| TestSetRow {
            query: g.input.clone(),
            reference_answer: g.expected_output.clone(),
            reference_contexts: include_context.then(|| encode_string_list(&g.context)),
        })
        .collect()
}

/// Write any serializable rows as CSV with a header line.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a generated test set back.
pub fn load_test_set(path: &Path) -> Result<Vec<TestSetRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<TestSetRow>, csv::Error>>()?;
    Ok(rows)
}
