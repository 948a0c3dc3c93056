//! Mock backends for testing and offline development.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatBackend, ChatRequest, EmbeddingBackend};
use crate::error::LlmError;

/// A mock chat backend that replays queued replies and records every request.
///
/// When the queue is empty the fallback reply is returned, or an
/// [`LlmError::Connection`] if none is set.
pub struct MockChatBackend {
    model: String,
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self {
            model: "mock-judge".to_string(),
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a backend that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new()
        }
    }

    /// Queue a reply for the next `chat` call.
    pub fn queue_response(&self, text: impl Into<String>) {
        self.lock_replies().push_back(Ok(text.into()));
    }

    /// Queue a failure for the next `chat` call.
    pub fn queue_error(&self, message: impl Into<String>) {
        self.lock_replies().push_back(Err(message.into()));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let next = self.lock_replies().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::ApiRequest { message }),
            None => self.fallback.clone().ok_or_else(|| LlmError::Connection {
                message: "mock backend has no queued reply".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A deterministic embedding backend.
///
/// Each text maps to a small bag-of-letters vector, so equal texts embed
/// identically and texts sharing no letters are orthogonal.
pub struct MockEmbeddingBackend {
    model: String,
    batches: Mutex<Vec<usize>>,
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            model: "mock-embedder".to_string(),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Sizes of the batches received so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(inputs.len());
        Ok(inputs.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
