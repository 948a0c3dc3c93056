use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::verdicts::VerdictList;
use super::{Metric, MetricScore, numbered};
use crate::dataset::TestCase;
use crate::error::EvalError;
use crate::models::EvaluationModel;

/// Whether the claims in the actual output are backed by the retrieved
/// context. Only contradicted claims count against the score.
pub struct FaithfulnessMetric {
    judge: Arc<EvaluationModel>,
    threshold: f64,
}

impl FaithfulnessMetric {
    pub fn new(judge: Arc<EvaluationModel>, threshold: f64) -> Self {
        Self { judge, threshold }
    }

    fn prompt(case: &TestCase) -> String {
        format!(
            "Extract every factual claim made in the ACTUAL OUTPUT. For each claim, decide whether \
it agrees with the RETRIEVAL CONTEXT.\n\
Answer \"yes\" if the context supports it, \"no\" if the context contradicts it, or \"idk\" if \
the context does not say.\n\
Return a JSON object with a \"verdicts\" list (one {{\"verdict\", \"reason\"}} per claim, in \
order) and a one-sentence \"reason\" for the overall faithfulness.\n\n\
RETRIEVAL CONTEXT:\n{}\n\nACTUAL OUTPUT:\n{}",
            numbered(case.retrieval_context()),
            case.actual_output()
        )
    }
}

#[async_trait]
impl Metric for FaithfulnessMetric {
    fn name(&self) -> &str {
        "Faithfulness"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError> {
        let verdicts: VerdictList = self.judge.generate_structured(&Self::prompt(case)).await?;
        let score = verdicts.share_not_no();
        debug!(score, claims = verdicts.verdicts.len(), "Faithfulness judged");
        Ok(MetricScore {
            score,
            reason: verdicts.reason_or_summary("claims"),
        })
    }
}
