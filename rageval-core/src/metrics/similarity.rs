use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Metric, MetricScore};
use crate::dataset::TestCase;
use crate::error::EvalError;
use crate::models::EmbeddingModel;

/// Cosine similarity between the embeddings of the actual and expected
/// outputs, clamped to `[0, 1]`.
pub struct SemanticSimilarityMetric {
    embedder: Arc<dyn EmbeddingModel>,
    threshold: f64,
}

impl SemanticSimilarityMetric {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Some(0.0);
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

#[async_trait]
impl Metric for SemanticSimilarityMetric {
    fn name(&self) -> &str {
        "Semantic Similarity"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError> {
        let texts = vec![
            case.actual_output().to_string(),
            case.expected_output().to_string(),
        ];
        let vectors = self.embedder.embed_texts(&texts).await?;
        let [actual, expected] = vectors.as_slice() else {
            return Err(EvalError::metric(
                self.name(),
                format!("expected 2 embeddings, got {}", vectors.len()),
            ));
        };
        let similarity = cosine(actual, expected).ok_or_else(|| {
            EvalError::metric(
                self.name(),
                format!(
                    "embedding dimensions differ ({} vs {})",
                    actual.len(),
                    expected.len()
                ),
            )
        })?;
        let score = similarity.clamp(0.0, 1.0);
        debug!(score, model = self.embedder.model_name(), "Semantic similarity computed");
        Ok(MetricScore {
            score,
            reason: format!(
                "Cosine similarity {:.3} between actual and expected output embeddings ({})",
                similarity,
                self.embedder.model_name()
            ),
        })
    }
}
