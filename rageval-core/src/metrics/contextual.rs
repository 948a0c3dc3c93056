//! Retrieval-side metrics: how well the retrieved nodes serve the expected
//! output.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::verdicts::VerdictList;
use super::{Metric, MetricScore, numbered};
use crate::dataset::TestCase;
use crate::error::EvalError;
use crate::models::EvaluationModel;

/// Whether relevant nodes are ranked above irrelevant ones.
pub struct ContextualPrecisionMetric {
    judge: Arc<EvaluationModel>,
    threshold: f64,
}

impl ContextualPrecisionMetric {
    pub fn new(judge: Arc<EvaluationModel>, threshold: f64) -> Self {
        Self { judge, threshold }
    }

    fn prompt(case: &TestCase) -> String {
        format!(
            "For each node of the RETRIEVAL CONTEXT, in the order given, decide whether it was \
useful in arriving at the EXPECTED OUTPUT for the INPUT.\n\
Answer \"yes\" or \"no\" for every node. Return a JSON object with a \"verdicts\" list holding \
exactly one {{\"verdict\", \"reason\"}} per node, in node order, and a one-sentence \"reason\" \
explaining the ranking quality.\n\n\
INPUT:\n{}\n\nEXPECTED OUTPUT:\n{}\n\nRETRIEVAL CONTEXT:\n{}",
            case.input(),
            case.expected_output(),
            numbered(case.retrieval_context())
        )
    }
}

#[async_trait]
impl Metric for ContextualPrecisionMetric {
    fn name(&self) -> &str {
        "Contextual Precision"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError> {
        let verdicts: VerdictList = self.judge.generate_structured(&Self::prompt(case)).await?;
        let nodes = case.retrieval_context().len();
        if verdicts.verdicts.len() != nodes {
            return Err(EvalError::metric(
                self.name(),
                format!(
                    "judge returned {} verdicts for {} retrieval nodes",
                    verdicts.verdicts.len(),
                    nodes
                ),
            ));
        }
        let score = if nodes == 0 {
            1.0
        } else {
            verdicts.weighted_precision()
        };
        debug!(score, nodes, "Contextual precision judged");
        Ok(MetricScore {
            score,
            reason: verdicts.reason_or_summary("nodes"),
        })
    }
}

/// How much of the expected output the retrieved context can account for.
pub struct ContextualRecallMetric {
    judge: Arc<EvaluationModel>,
    threshold: f64,
}

impl ContextualRecallMetric {
    pub fn new(judge: Arc<EvaluationModel>, threshold: f64) -> Self {
        Self { judge, threshold }
    }

    fn prompt(case: &TestCase) -> String {
        format!(
            "Split the EXPECTED OUTPUT into sentences. For each sentence, decide whether it can be \
attributed to any node of the RETRIEVAL CONTEXT.\n\
Answer \"yes\" or \"no\" for every sentence. Return a JSON object with a \"verdicts\" list (one \
{{\"verdict\", \"reason\"}} per sentence, in order) and a one-sentence \"reason\" for the overall \
recall.\n\n\
EXPECTED OUTPUT:\n{}\n\nRETRIEVAL CONTEXT:\n{}",
            case.expected_output(),
            numbered(case.retrieval_context())
        )
    }
}

#[async_trait]
impl Metric for ContextualRecallMetric {
    fn name(&self) -> &str {
        "Contextual Recall"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError> {
        let verdicts: VerdictList = self.judge.generate_structured(&Self::prompt(case)).await?;
        let score = verdicts.share_yes();
        debug!(score, sentences = verdicts.verdicts.len(), "Contextual recall judged");
        Ok(MetricScore {
            score,
            reason: verdicts.reason_or_summary("sentences"),
        })
    }
}
