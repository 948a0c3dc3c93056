//! Client for a model served behind a vLLM-style `/generate` endpoint.
//!
//! The endpoint answers with JSON objects of the form `{"text": [..]}`.
//! Non-streaming replies put one object per line; streaming replies
//! terminate each object with a NUL byte.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ServingConfig;
use crate::error::{EvalError, Result};

const USER_AGENT: &str = "vLLM Client";

/// Body of a `/generate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_beam_search: Option<bool>,
}

impl GenerateRequest {
    /// Greedy single completion, as the demo sends it.
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            stream: false,
            max_tokens: Some(max_tokens),
            temperature: Some(0.0),
            n: Some(1),
            stop: None,
            use_beam_search: None,
        }
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop = Some(stop.into());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    text: Vec<String>,
}

fn first_text(raw: &[u8]) -> Result<String> {
    let chunk: GenerateChunk = serde_json::from_slice(raw)?;
    chunk
        .text
        .into_iter()
        .next()
        .ok_or_else(|| EvalError::serving("response object has an empty 'text' list"))
}

pub struct ServingClient {
    client: reqwest::Client,
    url: String,
}

impl ServingClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn from_config(config: &ServingConfig) -> Self {
        Self::new(config.model_url.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &GenerateRequest) -> Result<reqwest::Response> {
        debug!(url = %self.url, stream = request.stream, "Sending generate request");
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(request)
            .send()
            .await
            .map_err(|e| EvalError::serving(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::serving(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    /// Send a request and return `text[0]` of every JSON line in the reply.
    pub async fn complete(&self, request: &GenerateRequest) -> Result<Vec<String>> {
        let body = self
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| EvalError::serving(format!("failed to read response: {}", e)))?;

        body.split(|b| *b == b'\n' || *b == 0)
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(first_text)
            .collect()
    }

    /// Send a request and forward `text[0]` of each NUL-delimited object to
    /// `tx` as it arrives. Objects split across network reads are joined
    /// before parsing. Returns the number of texts sent.
    pub async fn complete_stream(
        &self,
        request: &GenerateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<usize> {
        let mut stream = self.send(request).await?.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut sent = 0;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| EvalError::serving(format!("failed to read stream: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == 0) {
                let frame: Vec<u8> = buffer.drain(..=pos).collect();
                let frame = &frame[..frame.len() - 1];
                if frame.is_empty() {
                    continue;
                }
                if tx.send(first_text(frame)?).await.is_err() {
                    debug!("Stream receiver dropped, stopping");
                    return Ok(sent);
                }
                sent += 1;
            }
        }

        if !buffer.iter().all(u8::is_ascii_whitespace) {
            match first_text(&buffer) {
                Ok(text) => {
                    if tx.send(text).await.is_ok() {
                        sent += 1;
                    }
                }
                Err(e) => warn!(error = %e, "Discarding incomplete trailing stream frame"),
            }
        }
        Ok(sent)
    }
}
