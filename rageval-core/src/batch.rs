//! Evaluates a list of test-set files one after another.

use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::dataset::{MalformedRowPolicy, assemble_test_cases, load_eval_rows};
use crate::error::{EvalError, Result};
use crate::evaluator::{MetricEvaluator, TestResult};
use crate::metrics::Metric;

/// Results for one test-set file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetEvaluation {
    name: String,
    results: Vec<TestResult>,
}

impl DatasetEvaluation {
    pub fn new(name: impl Into<String>, results: Vec<TestResult>) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }
}

/// Dataset name for a test-set path: the file name up to its first `.`.
///
/// `results/basic_rag.v2.csv` becomes `basic_rag`.
pub fn dataset_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file_name,
    }
}

/// Runs the evaluator over several test sets with a shared metric list.
pub struct BatchRunner {
    evaluator: MetricEvaluator,
    metrics: Vec<Arc<dyn Metric>>,
    row_limit: Option<usize>,
    policy: MalformedRowPolicy,
}

impl BatchRunner {
    pub fn new(evaluator: MetricEvaluator, metrics: Vec<Arc<dyn Metric>>) -> Self {
        Self {
            evaluator,
            metrics,
            row_limit: None,
            policy: MalformedRowPolicy::default(),
        }
    }

    /// Evaluate at most `limit` rows of each file.
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn with_malformed_rows(mut self, policy: MalformedRowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate every file in order.
    ///
    /// All paths are opened before any evaluation starts, so a missing file
    /// fails the batch without spending judge calls.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<Vec<DatasetEvaluation>> {
        for path in paths {
            File::open(path).map_err(|source| EvalError::MissingTestSet {
                path: path.clone(),
                source,
            })?;
        }

        let mut evaluations = Vec::with_capacity(paths.len());
        for path in paths {
            let name = dataset_name(path);
            info!(dataset = %name, path = %path.display(), "Evaluating dataset");

            let rows = load_eval_rows(path, self.row_limit)?;
            let cases = assemble_test_cases(&name, &rows, self.policy)?;
            let results = self.evaluator.evaluate(&cases, &self.metrics).await?;

            info!(dataset = %name, results = results.len(), "Dataset evaluated");
            evaluations.push(DatasetEvaluation::new(name, results));
        }
        Ok(evaluations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluateOptions;
    use crate::metrics::FaithfulnessMetric;
    use crate::models::EvaluationModel;
    use crate::providers::MockChatBackend;

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name(Path::new("results/basic_rag.csv")), "basic_rag");
        assert_eq!(dataset_name(Path::new("/tmp/a.b.csv")), "a");
        assert_eq!(dataset_name(Path::new("plain")), "plain");
        assert_eq!(dataset_name(Path::new(".hidden.csv")), "");
    }

    fn runner(backend: Arc<MockChatBackend>) -> BatchRunner {
        let judge = Arc::new(EvaluationModel::new(backend));
        let metrics: Vec<Arc<dyn Metric>> = vec![Arc::new(FaithfulnessMetric::new(judge, 0.5))];
        BatchRunner::new(MetricEvaluator::new(EvaluateOptions::default()), metrics)
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_any_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.csv");
        std::fs::write(&present, "query,answer,contexts,reference_answer\nq?,a,['c'],r\n").unwrap();
        let missing = dir.path().join("missing.csv");

        let backend = Arc::new(MockChatBackend::with_response(r#"{"verdicts": []}"#));
        let err = runner(backend.clone())
            .run(&[present, missing.clone()])
            .await
            .unwrap_err();

        match err {
            EvalError::MissingTestSet { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_row_policy_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.csv");
        std::fs::write(
            &path,
            "query,answer,contexts,reference_answer\nq1?,a,['c'],r\nq2?,a,oops,r\n",
        )
        .unwrap();
        let backend = Arc::new(MockChatBackend::with_response(r#"{"verdicts": []}"#));

        let err = runner(backend.clone()).run(&[path.clone()]).await.unwrap_err();
        assert!(matches!(err, EvalError::MalformedContext { row: 1, .. }));

        let evals = runner(backend)
            .with_malformed_rows(MalformedRowPolicy::Skip)
            .run(&[path])
            .await
            .unwrap();
        assert_eq!(evals[0].results().len(), 1);
        assert_eq!(evals[0].name(), "set");
    }

    #[tokio::test]
    async fn test_empty_path_list() {
        let backend = Arc::new(MockChatBackend::new());
        assert!(runner(backend).run(&[]).await.unwrap().is_empty());
    }
}
