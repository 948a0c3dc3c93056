//! Column-oriented view of batch results, keyed by dataset and metric.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io;

use crate::batch::DatasetEvaluation;
use crate::error::{EvalError, Result};
use crate::evaluator::MetricData;

/// Score, reason and error sequences for one metric of one dataset.
///
/// The three sequences only grow together through [`MetricColumns::push`], so
/// index `i` in each always refers to the same test case.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricColumns {
    metric: String,
    scores: Vec<Option<f64>>,
    reasons: Vec<Option<String>>,
    errors: Vec<Option<String>>,
}

impl MetricColumns {
    fn new(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            scores: Vec::new(),
            reasons: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, data: &MetricData) {
        self.scores.push(data.score);
        self.reasons.push(data.reason.clone());
        self.errors.push(data.error.clone());
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn scores(&self) -> &[Option<f64>] {
        &self.scores
    }

    pub fn reasons(&self) -> &[Option<String>] {
        &self.reasons
    }

    pub fn errors(&self) -> &[Option<String>] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mean of the scores that exist. `None` when every entry failed.
    pub fn mean_score(&self) -> Option<f64> {
        let present: Vec<f64> = self.scores.iter().flatten().copied().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }

    pub fn score_key(&self) -> String {
        format!("{} Score", self.metric)
    }

    pub fn reason_key(&self) -> String {
        format!("{} Reason", self.metric)
    }

    pub fn error_key(&self) -> String {
        format!("{} Error", self.metric)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DatasetColumns {
    name: String,
    columns: Vec<MetricColumns>,
}

impl DatasetColumns {
    fn column_mut(&mut self, metric: &str) -> &mut MetricColumns {
        let pos = match self.columns.iter().position(|c| c.metric == metric) {
            Some(pos) => pos,
            None => {
                self.columns.push(MetricColumns::new(metric));
                self.columns.len() - 1
            }
        };
        &mut self.columns[pos]
    }
}

/// Per-dataset metric columns, in the order datasets were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSummary {
    datasets: Vec<DatasetColumns>,
}

impl ResultSummary {
    /// Dataset names in order.
    pub fn datasets(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    /// Metric columns of one dataset, in first-seen metric order.
    pub fn columns(&self, dataset: &str) -> Option<&[MetricColumns]> {
        self.datasets
            .iter()
            .find(|d| d.name == dataset)
            .map(|d| d.columns.as_slice())
    }

    fn dataset_mut(&mut self, name: &str) -> &mut DatasetColumns {
        let pos = match self.datasets.iter().position(|d| d.name == name) {
            Some(pos) => {
                self.datasets[pos].columns.clear();
                pos
            }
            None => {
                self.datasets.push(DatasetColumns {
                    name: name.to_string(),
                    columns: Vec::new(),
                });
                self.datasets.len() - 1
            }
        };
        &mut self.datasets[pos]
    }

    /// Write one dataset as CSV: a header of `Score`/`Reason`/`Error` keys per
    /// metric, then one row per test case. Missing values are empty cells.
    pub fn write_csv<W: io::Write>(&self, dataset: &str, writer: W) -> Result<()> {
        let columns = self
            .columns(dataset)
            .ok_or_else(|| EvalError::invalid_input(format!("unknown dataset '{}'", dataset)))?;

        let mut out = csv::Writer::from_writer(writer);
        let header: Vec<String> = columns
            .iter()
            .flat_map(|c| [c.score_key(), c.reason_key(), c.error_key()])
            .collect();
        out.write_record(&header)?;

        let rows = columns.iter().map(MetricColumns::len).max().unwrap_or(0);
        for i in 0..rows {
            let mut record = Vec::with_capacity(header.len());
            for c in columns {
                record.push(
                    c.scores
                        .get(i)
                        .copied()
                        .flatten()
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                );
                record.push(c.reasons.get(i).cloned().flatten().unwrap_or_default());
                record.push(c.errors.get(i).cloned().flatten().unwrap_or_default());
            }
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

struct DatasetMap<'a>(&'a [MetricColumns]);

impl Serialize for DatasetMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() * 3))?;
        for c in self.0 {
            map.serialize_entry(&c.score_key(), &c.scores)?;
            map.serialize_entry(&c.reason_key(), &c.reasons)?;
            map.serialize_entry(&c.error_key(), &c.errors)?;
        }
        map.end()
    }
}

impl Serialize for ResultSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.datasets.len()))?;
        for d in &self.datasets {
            map.serialize_entry(&d.name, &DatasetMap(&d.columns))?;
        }
        map.end()
    }
}

/// Flatten batch results into columns in one pass, walking datasets, then
/// test cases, then metrics. A repeated dataset name replaces the earlier
/// dataset's columns but keeps its position.
pub fn flatten_results(evaluations: &[DatasetEvaluation]) -> ResultSummary {
    let mut summary = ResultSummary::default();
    for evaluation in evaluations {
        let dataset = summary.dataset_mut(evaluation.name());
        for result in evaluation.results() {
            for data in &result.metrics_data {
                dataset.column_mut(&data.name).push(data);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::TestResult;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scored(name: &str, score: f64) -> MetricData {
        MetricData {
            name: name.to_string(),
            threshold: 0.5,
            score: Some(score),
            reason: Some(format!("{name} reason")),
            error: None,
            success: score >= 0.5,
        }
    }

    fn failed(name: &str) -> MetricData {
        MetricData {
            name: name.to_string(),
            threshold: 0.5,
            score: None,
            reason: None,
            error: Some("timeout".to_string()),
            success: false,
        }
    }

    fn result(input: &str, data: Vec<MetricData>) -> TestResult {
        TestResult {
            input: input.to_string(),
            metrics_data: data,
        }
    }

    #[test]
    fn test_flatten_single_pass_order() {
        let evals = vec![
            DatasetEvaluation::new(
                "basic_rag",
                vec![
                    result("q1", vec![scored("Faithfulness", 0.9), scored("Answer Relevancy", 0.4)]),
                    result("q2", vec![failed("Faithfulness"), scored("Answer Relevancy", 1.0)]),
                ],
            ),
            DatasetEvaluation::new("hybrid", vec![result("q1", vec![scored("Faithfulness", 0.7)])]),
        ];

        let summary = flatten_results(&evals);
        assert_eq!(summary.datasets(), vec!["basic_rag", "hybrid"]);

        let cols = summary.columns("basic_rag").unwrap();
        assert_eq!(cols[0].metric(), "Faithfulness");
        assert_eq!(cols[0].scores(), &[Some(0.9), None]);
        assert_eq!(cols[0].errors(), &[None, Some("timeout".to_string())]);
        assert_eq!(cols[0].reasons().len(), 2);
        assert_eq!(cols[0].mean_score(), Some(0.9));
        assert_eq!(cols[0].error_count(), 1);
        assert_eq!(cols[1].scores(), &[Some(0.4), Some(1.0)]);
        assert!(summary.columns("missing").is_none());
    }

    #[test]
    fn test_repeated_dataset_last_wins_in_place() {
        let evals = vec![
            DatasetEvaluation::new("a", vec![result("q", vec![scored("M", 0.1)])]),
            DatasetEvaluation::new("b", vec![result("q", vec![scored("M", 0.2)])]),
            DatasetEvaluation::new("a", vec![result("q", vec![scored("M", 0.3)])]),
        ];
        let summary = flatten_results(&evals);
        assert_eq!(summary.datasets(), vec!["a", "b"]);
        assert_eq!(summary.columns("a").unwrap()[0].scores(), &[Some(0.3)]);
    }

    #[test]
    fn test_serializes_keyed_columns() {
        let evals = vec![DatasetEvaluation::new(
            "basic_rag",
            vec![result("q", vec![failed("Faithfulness")])],
        )];
        let value = serde_json::to_value(flatten_results(&evals)).unwrap();
        assert_eq!(
            value,
            json!({
                "basic_rag": {
                    "Faithfulness Score": [null],
                    "Faithfulness Reason": [null],
                    "Faithfulness Error": ["timeout"]
                }
            })
        );
    }

    #[test]
    fn test_empty_input() {
        let summary = flatten_results(&[]);
        assert!(summary.datasets().is_empty());
        assert_eq!(serde_json::to_string(&summary).unwrap(), "{}");
    }

    #[test]
    fn test_write_csv() {
        let evals = vec![DatasetEvaluation::new(
            "basic_rag",
            vec![
                result("q1", vec![scored("Faithfulness", 0.5)]),
                result("q2", vec![failed("Faithfulness")]),
            ],
        )];
        let summary = flatten_results(&evals);
        let mut buf = Vec::new();
        summary.write_csv("basic_rag", &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Faithfulness Score,Faithfulness Reason,Faithfulness Error\n\
0.5,Faithfulness reason,\n\
,,timeout\n"
        );
        assert!(summary.write_csv("nope", Vec::new()).is_err());
    }
}
