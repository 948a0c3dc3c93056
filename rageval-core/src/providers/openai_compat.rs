//! OpenAI-compatible chat and embedding clients.
//!
//! Works against vLLM, NVIDIA NIM, Ollama, and any endpoint that follows the
//! OpenAI chat completions and embeddings API format.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatBackend, ChatMessage, ChatRequest, EmbeddingBackend, Role};
use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::LlmError;

/// OpenAI-compatible chat provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    repetition_penalty: Option<f32>,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from `config.api_key` or the environment variable named by
    /// `config.api_key_env`. Local endpoints work without a key.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let api_key = resolve_key(config.resolve_api_key(), &base_url, &config.api_key_env)?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            repetition_penalty: config.repetition_penalty,
        })
    }

    /// Convert messages to OpenAI JSON format.
    fn messages_to_json(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect()
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(&request.messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });
        if let Some(penalty) = self.repetition_penalty {
            body["repetition_penalty"] = json!(penalty);
        }
        if let Some(schema) = &request.guided_json {
            body["guided_json"] = schema.clone();
        }
        body
    }

    /// Pull the assistant text out of a chat completion body.
    fn parse_response(body: &Value) -> Result<String, LlmError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;
        Ok(message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string())
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleProvider {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(url = %url, model = %self.model, guided = request.guided_json.is_some(), "Sending chat completion request");

        let json = post_json(&self.client, &url, &self.api_key, &body).await?;
        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible embedding client.
pub struct OpenAiCompatibleEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://integrate.api.nvidia.com/v1".to_string());
        let api_key = resolve_key(
            std::env::var(&config.api_key_env).ok(),
            &base_url,
            &config.api_key_env,
        )?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Read `data[*].embedding`, ordered by each entry's `index`.
    fn parse_embeddings(body: &Value, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
        let data = body
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No data in embedding response".to_string(),
            })?;

        let mut indexed: Vec<(usize, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item
                    .get("index")
                    .and_then(|i| i.as_u64())
                    .map(|i| i as usize)
                    .unwrap_or(pos);
                let vector = item
                    .get("embedding")
                    .and_then(|e| e.as_array())
                    .ok_or_else(|| LlmError::ResponseParse {
                        message: format!("Embedding {} has no vector", index),
                    })?
                    .iter()
                    .map(|v| {
                        v.as_f64().map(|x| x as f32).ok_or_else(|| LlmError::ResponseParse {
                            message: format!("Embedding {} has a non-numeric component: {}", index, v),
                        })
                    })
                    .collect::<Result<Vec<f32>, LlmError>>()?;
                Ok((index, vector))
            })
            .collect::<Result<_, LlmError>>()?;
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != expected {
            return Err(LlmError::ResponseParse {
                message: format!(
                    "Expected {} embeddings, got {}",
                    expected,
                    indexed.len()
                ),
            });
        }
        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiCompatibleEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
            "input_type": "query",
            "encoding_format": "float",
            "truncate": "END",
        });

        debug!(url = %url, model = %self.model, count = inputs.len(), "Sending embedding request");

        let json = post_json(&self.client, &url, &self.api_key, &body).await?;
        Self::parse_embeddings(&json, inputs.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn resolve_key(key: Option<String>, base_url: &str, env_var: &str) -> Result<String, LlmError> {
    let is_local = base_url.contains("localhost") || base_url.contains("127.0.0.1");
    key.or_else(|| {
        if is_local {
            // Local vLLM servers accept any bearer token.
            debug!("No API key set for local endpoint; using dummy bearer token");
            Some("local".to_string())
        } else {
            None
        }
    })
    .ok_or_else(|| LlmError::AuthFailed {
        provider: format!("OpenAI-compatible: env var '{}' not set", env_var),
    })
}

async fn post_json(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> Result<Value, LlmError> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Connection {
            message: format!("Request failed: {}", e),
        })?;

    let status = response.status();
    let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
        message: format!("Failed to read response body: {}", e),
    })?;

    if !status.is_success() {
        return Err(map_http_error(status, &response_body));
    }

    serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
        message: format!("Invalid JSON: {}", e),
    })
}

/// Map an HTTP status code to the appropriate LlmError.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 => {
            debug!(body = %body, "Authentication failed (401)");
            LlmError::AuthFailed {
                provider: "OpenAI-compatible".to_string(),
            }
        }
        429 => {
            // "Rate limit reached ... try again in 20s"
            let retry_secs = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("error")?
                        .get("message")?
                        .as_str()
                        .map(|s| s.to_string())
                })
                .and_then(|msg| {
                    msg.split("in ")
                        .last()
                        .and_then(|s| s.trim_end_matches('s').parse::<u64>().ok())
                })
                .unwrap_or(5);
            LlmError::RateLimited {
                retry_after_secs: retry_secs,
            }
        }
        status if status >= 500 => LlmError::ApiRequest {
            message: format!("Server error ({}): {}", status, body),
        },
        _ => LlmError::ApiRequest {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
