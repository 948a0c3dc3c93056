//! Scoring functions run by the [`crate::evaluator::MetricEvaluator`].
//!
//! The four RAG metrics are LLM-as-judge metrics: each sends one structured
//! request to the judge per test case and turns the returned verdict list into
//! a score in `[0, 1]`. Semantic similarity uses the embedding model instead.

pub mod answer_relevancy;
pub mod contextual;
pub mod faithfulness;
pub mod similarity;
pub mod verdicts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dataset::TestCase;
use crate::error::{ConfigError, EvalError};
use crate::models::{EmbeddingModel, EvaluationModel};

pub use answer_relevancy::AnswerRelevancyMetric;
pub use contextual::{ContextualPrecisionMetric, ContextualRecallMetric};
pub use faithfulness::FaithfulnessMetric;
pub use similarity::SemanticSimilarityMetric;

/// Score and rationale produced by one metric for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub score: f64,
    pub reason: String,
}

/// A named scoring function over a test case.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Display name, used for result column keys.
    fn name(&self) -> &str;

    /// Minimum score counted as a pass.
    fn threshold(&self) -> f64;

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError>;
}

/// Registry identifiers accepted by [`build_metrics`].
pub const METRIC_IDS: &[&str] = &[
    "answer_relevancy",
    "faithfulness",
    "contextual_precision",
    "contextual_recall",
    "semantic_similarity",
];

/// Build metrics by registry id, in the order given.
///
/// `semantic_similarity` needs an embedder; asking for it without one is a
/// configuration error, as is any unknown id.
pub fn build_metrics(
    ids: &[String],
    judge: Arc<EvaluationModel>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    threshold: f64,
) -> Result<Vec<Arc<dyn Metric>>, ConfigError> {
    ids.iter()
        .map(|id| -> Result<Arc<dyn Metric>, ConfigError> {
            let metric: Arc<dyn Metric> = match id.as_str() {
                "answer_relevancy" => {
                    Arc::new(AnswerRelevancyMetric::new(judge.clone(), threshold))
                }
                "faithfulness" => Arc::new(FaithfulnessMetric::new(judge.clone(), threshold)),
                "contextual_precision" => {
                    Arc::new(ContextualPrecisionMetric::new(judge.clone(), threshold))
                }
                "contextual_recall" => {
                    Arc::new(ContextualRecallMetric::new(judge.clone(), threshold))
                }
                "semantic_similarity" => {
                    let embedder = embedder.clone().ok_or_else(|| ConfigError::Invalid {
                        message: "semantic_similarity requires an embedding model".to_string(),
                    })?;
                    Arc::new(SemanticSimilarityMetric::new(embedder, threshold))
                }
                other => {
                    return Err(ConfigError::UnknownMetric {
                        name: other.to_string(),
                    });
                }
            };
            Ok(metric)
        })
        .collect()
}

/// Render a list of passages as numbered nodes for a judge prompt.
pub(crate) fn numbered(passages: &[String]) -> String {
    if passages.is_empty() {
        return "(none)".to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n")
}
