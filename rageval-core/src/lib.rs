//! # rageval core
//!
//! Evaluation of retrieval-augmented generation pipelines with an
//! LLM-as-judge. Provides test-set loading and filtering, the judge and
//! embedding model wrappers, the metric evaluator, the batch runner, result
//! flattening, and a client for the model serving endpoint.

pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod flatten;
pub mod literal;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod records;
pub mod responses;
pub mod serving;
pub mod storage;

// Re-export commonly used types at the crate root.
pub use batch::{BatchRunner, DatasetEvaluation, dataset_name};
pub use config::{RagEvalConfig, load_config};
pub use dataset::{EvaluationRow, MalformedRowPolicy, TestCase};
pub use error::{ConfigError, EvalError, LiteralError, LlmError, Result};
pub use evaluator::{EvaluateOptions, MetricData, MetricEvaluator, TestResult};
pub use flatten::{MetricColumns, ResultSummary, flatten_results};
pub use metrics::{Metric, MetricScore, build_metrics};
pub use models::{
    EmbeddingModel, EvaluationModel, GenerationModel, NvidiaEmbeddingModel, SynthesizerModel,
};
pub use serving::{GenerateRequest, ServingClient};
