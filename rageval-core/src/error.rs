//! Error types for the rageval core library.
//!
//! Uses `thiserror` for public API error types, one enum per domain: the judge
//! and embedding service boundary, context literal parsing, configuration, and
//! the evaluation pipeline itself.

use std::path::PathBuf;

/// Top-level error type for the evaluation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Test set not found or unreadable: {path}: {source}")]
    MissingTestSet {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed contexts field in dataset '{dataset}', row {row}: {source}")]
    MalformedContext {
        dataset: String,
        row: usize,
        #[source]
        source: LiteralError,
    },

    #[error("Metric '{metric}' failed: {message}")]
    Metric { metric: String, message: String },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serving endpoint error: {message}")]
    Serving { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    pub fn metric(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metric {
            metric: metric.into(),
            message: message.into(),
        }
    }

    pub fn serving(message: impl Into<String>) -> Self {
        Self::Serving {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Errors from judge and embedding service interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Structured output did not match schema: {message}")]
    StructuredOutput { message: String, raw: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Blocking call unavailable: {message}")]
    Runtime { message: String },
}

/// Errors from parsing a string-encoded list literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    #[error("empty input")]
    Empty,

    #[error("expected {expected} at offset {offset}")]
    Unexpected {
        expected: &'static str,
        offset: usize,
    },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("trailing characters after list at offset {offset}")]
    TrailingInput { offset: usize },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_context_display_names_row() {
        let err = EvalError::MalformedContext {
            dataset: "hybrid__llama".into(),
            row: 3,
            source: LiteralError::UnterminatedString { offset: 1 },
        };
        let msg = err.to_string();
        assert!(msg.contains("hybrid__llama"));
        assert!(msg.contains("row 3"));
        assert!(msg.contains("unterminated string"));
    }

    #[test]
    fn test_llm_error_converts() {
        let err: EvalError = LlmError::RateLimited {
            retry_after_secs: 7,
        }
        .into();
        assert!(matches!(err, EvalError::Llm(LlmError::RateLimited { .. })));
        assert_eq!(
            err.to_string(),
            "LLM error: Rate limited by provider, retry after 7s"
        );
    }

    #[test]
    fn test_structured_output_keeps_raw_text() {
        let err = LlmError::StructuredOutput {
            message: "expected value at line 1 column 1".into(),
            raw: "not json".into(),
        };
        match err {
            LlmError::StructuredOutput { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
