//! Judge and embedding service boundary.
//!
//! [`ChatBackend`] and [`EmbeddingBackend`] are the only places the crate talks
//! to a model. Everything above them (model wrappers, metrics, the evaluator)
//! is written against these traits so tests can swap in the mocks.

pub mod mock;
pub mod openai_compat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;

pub use mock::{MockChatBackend, MockEmbeddingBackend};
pub use openai_compat::{OpenAiCompatibleEmbedder, OpenAiCompatibleProvider};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single chat completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// JSON schema the server must constrain its output to (vLLM `guided_json`).
    pub guided_json: Option<Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            guided_json: None,
        }
    }

    pub fn with_guided_json(mut self, schema: Value) -> Self {
        self.guided_json = Some(schema);
        self
    }
}

/// A chat-completion service returning free text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the messages and return the assistant's text.
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// An embedding service returning one vector per input, in input order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    fn model_name(&self) -> &str;
}
