//! Runs every metric over every test case and records the outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dataset::TestCase;
use crate::error::Result;
use crate::metrics::Metric;

/// Outcome of one metric on one test case.
///
/// Either `score` and `reason` are set (the metric ran) or `error` is set
/// (it failed and errors were being ignored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub name: String,
    pub threshold: f64,
    pub score: Option<f64>,
    pub reason: Option<String>,
    pub error: Option<String>,
    pub success: bool,
}

impl MetricData {
    fn scored(metric: &dyn Metric, score: f64, reason: String) -> Self {
        Self {
            name: metric.name().to_string(),
            threshold: metric.threshold(),
            score: Some(score),
            reason: Some(reason),
            error: None,
            success: score >= metric.threshold(),
        }
    }

    fn failed(metric: &dyn Metric, error: String) -> Self {
        Self {
            name: metric.name().to_string(),
            threshold: metric.threshold(),
            score: None,
            reason: None,
            error: Some(error),
            success: false,
        }
    }
}

/// All metric outcomes for one test case, in metric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub input: String,
    pub metrics_data: Vec<MetricData>,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.metrics_data.iter().all(|m| m.success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateOptions {
    /// Record metric failures in the result instead of aborting.
    pub ignore_errors: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            ignore_errors: true,
        }
    }
}

/// Sequential metric runner.
#[derive(Debug, Clone, Default)]
pub struct MetricEvaluator {
    options: EvaluateOptions,
}

impl MetricEvaluator {
    pub fn new(options: EvaluateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EvaluateOptions {
        self.options
    }

    /// Evaluate `cases` against `metrics`. Results follow case order, and each
    /// result's metric data follows metric order.
    pub async fn evaluate(
        &self,
        cases: &[TestCase],
        metrics: &[Arc<dyn Metric>],
    ) -> Result<Vec<TestResult>> {
        info!(
            cases = cases.len(),
            metrics = metrics.len(),
            "Evaluating test cases"
        );
        let mut results = Vec::with_capacity(cases.len());

        for (idx, case) in cases.iter().enumerate() {
            let mut metrics_data = Vec::with_capacity(metrics.len());
            for metric in metrics {
                match metric.measure(case).await {
                    Ok(outcome) => {
                        debug!(
                            case = idx,
                            metric = metric.name(),
                            score = outcome.score,
                            "Metric measured"
                        );
                        metrics_data.push(MetricData::scored(
                            metric.as_ref(),
                            outcome.score,
                            outcome.reason,
                        ));
                    }
                    Err(e) if self.options.ignore_errors => {
                        warn!(case = idx, metric = metric.name(), error = %e, "Metric failed");
                        metrics_data.push(MetricData::failed(metric.as_ref(), e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
            results.push(TestResult {
                input: case.input().to_string(),
                metrics_data,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::metrics::MetricScore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Scores by input length, fails on inputs containing "boom".
    struct LengthMetric;

    #[async_trait]
    impl Metric for LengthMetric {
        fn name(&self) -> &str {
            "Length"
        }

        fn threshold(&self) -> f64 {
            0.5
        }

        async fn measure(&self, case: &TestCase) -> std::result::Result<MetricScore, EvalError> {
            if case.input().contains("boom") {
                return Err(EvalError::metric("Length", "exploded"));
            }
            Ok(MetricScore {
                score: case.input().len() as f64 / 10.0,
                reason: format!("{} chars", case.input().len()),
            })
        }
    }

    struct Constant(f64);

    #[async_trait]
    impl Metric for Constant {
        fn name(&self) -> &str {
            "Constant"
        }

        fn threshold(&self) -> f64 {
            0.5
        }

        async fn measure(&self, _case: &TestCase) -> std::result::Result<MetricScore, EvalError> {
            Ok(MetricScore {
                score: self.0,
                reason: "fixed".into(),
            })
        }
    }

    fn cases(inputs: &[&str]) -> Vec<TestCase> {
        inputs
            .iter()
            .map(|i| TestCase::new(*i, "a", "e", vec![]))
            .collect()
    }

    fn metrics() -> Vec<Arc<dyn Metric>> {
        vec![Arc::new(LengthMetric), Arc::new(Constant(0.9))]
    }

    #[tokio::test]
    async fn test_results_follow_case_and_metric_order() {
        let evaluator = MetricEvaluator::default();
        let results = evaluator
            .evaluate(&cases(&["abcdefgh", "ab"]), &metrics())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].input, "abcdefgh");
        let names: Vec<&str> = results[0].metrics_data.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Length", "Constant"]);

        assert_eq!(results[0].metrics_data[0].score, Some(0.8));
        assert!(results[0].metrics_data[0].success);
        assert!(results[0].success());

        assert_eq!(results[1].metrics_data[0].score, Some(0.2));
        assert!(!results[1].metrics_data[0].success);
        assert!(!results[1].success());
    }

    #[tokio::test]
    async fn test_errors_are_recorded_when_ignored() {
        let evaluator = MetricEvaluator::new(EvaluateOptions {
            ignore_errors: true,
        });
        let results = evaluator
            .evaluate(&cases(&["boom", "fine input"]), &metrics())
            .await
            .unwrap();

        let failed = &results[0].metrics_data[0];
        assert_eq!(failed.score, None);
        assert_eq!(failed.reason, None);
        assert_eq!(
            failed.error.as_deref(),
            Some("Metric 'Length' failed: exploded")
        );
        assert!(!failed.success);
        // The next metric and the next case still ran.
        assert_eq!(results[0].metrics_data[1].score, Some(0.9));
        assert_eq!(results[1].metrics_data[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn test_errors_propagate_when_not_ignored() {
        let evaluator = MetricEvaluator::new(EvaluateOptions {
            ignore_errors: false,
        });
        let err = evaluator
            .evaluate(&cases(&["ok", "boom"]), &metrics())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Metric { .. }));
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let evaluator = MetricEvaluator::default();
        assert!(evaluator.evaluate(&[], &metrics()).await.unwrap().is_empty());
        let results = evaluator.evaluate(&cases(&["x"]), &[]).await.unwrap();
        assert!(results[0].metrics_data.is_empty());
        assert!(results[0].success());
    }
}
