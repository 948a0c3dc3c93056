use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::verdicts::VerdictList;
use super::{Metric, MetricScore};
use crate::dataset::TestCase;
use crate::error::EvalError;
use crate::models::EvaluationModel;

/// How well the actual output addresses the input.
///
/// The judge splits the answer into statements and marks each one; the score
/// is the share of statements not judged irrelevant.
pub struct AnswerRelevancyMetric {
    judge: Arc<EvaluationModel>,
    threshold: f64,
}

impl AnswerRelevancyMetric {
    pub fn new(judge: Arc<EvaluationModel>, threshold: f64) -> Self {
        Self { judge, threshold }
    }

    fn prompt(case: &TestCase) -> String {
        format!(
            "Break the ACTUAL OUTPUT into individual statements. For each statement, decide \
whether it is relevant to answering the INPUT.\n\
Answer \"yes\" if it is relevant, \"no\" if it is irrelevant, or \"idk\" if it is supporting \
information that is neither.\n\
Return a JSON object with a \"verdicts\" list (one {{\"verdict\", \"reason\"}} per statement, in \
order) and a one-sentence \"reason\" for the overall relevancy.\n\n\
INPUT:\n{}\n\nACTUAL OUTPUT:\n{}",
            case.input(),
            case.actual_output()
        )
    }
}

#[async_trait]
impl Metric for AnswerRelevancyMetric {
    fn name(&self) -> &str {
        "Answer Relevancy"
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn measure(&self, case: &TestCase) -> Result<MetricScore, EvalError> {
        let verdicts: VerdictList = self.judge.generate_structured(&Self::prompt(case)).await?;
        let score = verdicts.share_not_no();
        debug!(score, statements = verdicts.verdicts.len(), "Answer relevancy judged");
        Ok(MetricScore {
            score,
            reason: verdicts.reason_or_summary("statements"),
        })
    }
}
