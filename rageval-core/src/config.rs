//! Configuration system for rageval.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/rageval/config.toml` and/or `.rageval/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::MalformedRowPolicy;

/// Top-level configuration for rageval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagEvalConfig {
    /// Judge model used by the LLM-as-judge metrics.
    #[serde(default)]
    pub judge: LlmConfig,
    /// Model used to synthesize test sets.
    #[serde(default)]
    pub synthesizer: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub serving: ServingConfig,
}

/// Configuration for an OpenAI-compatible chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier (e.g., "meta/llama-3.1-70b-instruct").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Explicit API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    pub temperature: f32,
    /// Repetition penalty forwarded to vLLM-style servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "meta/llama-3.1-70b-instruct".to_string(),
            api_key_env: "NVIDIA_API_KEY".to_string(),
            base_url: Some("http://localhost:8000/v1".to_string()),
            api_key: None,
            max_tokens: 1024,
            temperature: 0.0,
            repetition_penalty: Some(1.0),
        }
    }
}

/// Configuration for the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Number of texts sent per embedding request.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nvidia/nv-embedqa-e5-v5".to_string(),
            api_key_env: "NVIDIA_API_KEY".to_string(),
            base_url: Some("http://localhost:8001/v1".to_string()),
            batch_size: 32,
        }
    }
}

/// Settings for the batch evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Metric names to run, see [`crate::metrics::build_metrics`].
    pub metrics: Vec<String>,
    /// Rows read from each test set. `None` reads every row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,
    /// Record per-case metric failures instead of aborting the batch.
    pub ignore_errors: bool,
    /// Minimum score for a metric to count as passed.
    pub threshold: f64,
    #[serde(default)]
    pub malformed_rows: MalformedRowPolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: vec![
                "contextual_precision".to_string(),
                "contextual_recall".to_string(),
                "answer_relevancy".to_string(),
                "faithfulness".to_string(),
            ],
            row_limit: Some(5),
            ignore_errors: true,
            threshold: 0.5,
            malformed_rows: MalformedRowPolicy::default(),
        }
    }
}

/// Directories used when saving and archiving test sets and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    pub current_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub responses_dir: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            current_dir: PathBuf::from("test_sets/current"),
            archive_dir: PathBuf::from("test_sets/archive"),
            responses_dir: PathBuf::from("responses"),
        }
    }
}

/// Model serving endpoint and web demo settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Full URL of the `/generate` endpoint.
    pub model_url: String,
    pub host: String,
    pub port: u16,
    pub max_tokens: u32,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_url: "http://localhost:8000/generate".to_string(),
            host: "localhost".to_string(),
            port: 8001,
            max_tokens: 200,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the config or the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
    }
}

impl RagEvalConfig {
    /// Return warnings for settings that are legal but probably a mistake.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.evaluation.metrics.is_empty() {
            warnings.push("evaluation.metrics is empty; no scores will be produced".to_string());
        }
        if self.evaluation.row_limit == Some(0) {
            warnings.push("evaluation.row_limit is 0; every test set will be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.evaluation.threshold) {
            warnings.push(format!(
                "evaluation.threshold is {}; scores are in [0, 1]",
                self.evaluation.threshold
            ));
        }
        if self.embedding.batch_size == 0 {
            warnings.push("embedding.batch_size is 0; it will be treated as 1".to_string());
        }
        if self.judge.temperature > 0.5 {
            warnings.push(format!(
                "judge.temperature is {}; verdicts may not be reproducible",
                self.judge.temperature
            ));
        }

        warnings
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RAGEVAL_`)
/// 3. Workspace-local config (`.rageval/config.toml`)
/// 4. User config (`~/.config/rageval/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&RagEvalConfig>,
) -> Result<RagEvalConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RagEvalConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "rageval", "rageval") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RAGEVAL_JUDGE__MODEL, RAGEVAL_EVALUATION__ROW_LIMIT, etc.
    figment = figment.merge(Env::prefixed("RAGEVAL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".rageval").join("config.toml")
}

/// Write the default configuration to `<workspace>/.rageval/config.toml`.
///
/// Returns `Ok(None)` without touching the file when one already exists.
pub fn write_default_config(workspace: &Path) -> crate::error::Result<Option<PathBuf>> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&RagEvalConfig::default()).map_err(|e| {
        crate::error::ConfigError::ParseError {
            message: e.to_string(),
        }
    })?;
    std::fs::write(&path, body)?;
    Ok(Some(path))
}
