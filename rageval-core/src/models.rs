//! Model wrappers handed to the metrics and the test-set synthesizer.
//!
//! Two capability contracts, each with async and blocking call forms:
//! [`GenerationModel`] for text generation and [`EmbeddingModel`] for vectors.
//! The blocking forms drive the async ones on a private current-thread
//! runtime, so they must not be called from inside a tokio runtime.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::error::LlmError;
use crate::providers::{ChatBackend, ChatMessage, ChatRequest, EmbeddingBackend};

const SYNTHESIZER_SYSTEM: &str = "You are an accurate assistant that is not chatty, and always provides accurate and very succinct completions. \
Don't generate greetings or other type of unnecessary text.";

const EVALUATOR_SYSTEM: &str = "You are an accurate assistant that is not chatty, and always provides accurate and very succinct responses. \
When asked to provide reasons or verdicts, you MUST use the very minimum amount of words and avoid full citations.";

/// Text generation capability.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Blocking form of [`GenerationModel::generate`].
    fn generate_blocking(&self, prompt: &str) -> Result<String, LlmError> {
        block_on(self.generate(prompt))?
    }

    fn model_name(&self) -> &str;
}

/// Embedding capability.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    fn embed_text_blocking(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        block_on(self.embed_text(text))?
    }

    fn embed_texts_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        block_on(self.embed_texts(texts))?
    }

    fn model_name(&self) -> &str;
}

/// A type the judge can be asked to produce as JSON.
pub trait JudgeSchema: DeserializeOwned {
    /// JSON schema sent to the server as the generation constraint.
    fn schema() -> Value;
}

fn block_on<F: Future>(future: F) -> Result<F::Output, LlmError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LlmError::Runtime {
            message: e.to_string(),
        })?;
    Ok(runtime.block_on(future))
}

/// Generator used to synthesize questions and answers for test sets.
pub struct SynthesizerModel {
    backend: Arc<dyn ChatBackend>,
}

impl SynthesizerModel {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl GenerationModel for SynthesizerModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYNTHESIZER_SYSTEM),
            ChatMessage::user(prompt),
        ]);
        self.backend.chat(request).await
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Judge model used by the LLM-as-judge metrics.
pub struct EvaluationModel {
    backend: Arc<dyn ChatBackend>,
}

impl EvaluationModel {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    fn messages(prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(EVALUATOR_SYSTEM),
            ChatMessage::user(prompt),
        ]
    }

    /// Ask the judge for output matching `T`'s schema and parse it.
    ///
    /// Unparseable output is logged together with the raw text and returned as
    /// [`LlmError::StructuredOutput`].
    pub async fn generate_structured<T: JudgeSchema + Send>(
        &self,
        prompt: &str,
    ) -> Result<T, LlmError> {
        let request = ChatRequest::new(Self::messages(prompt)).with_guided_json(T::schema());
        let raw = self.backend.chat(request).await?;
        parse_structured(&raw)
    }

    /// Blocking form of [`EvaluationModel::generate_structured`].
    pub fn generate_structured_blocking<T: JudgeSchema + Send>(
        &self,
        prompt: &str,
    ) -> Result<T, LlmError> {
        block_on(self.generate_structured(prompt))?
    }
}

#[async_trait]
impl GenerationModel for EvaluationModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.backend
            .chat(ChatRequest::new(Self::messages(prompt)))
            .await
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Parse judge output as `T`. Tolerates a fenced ```json block around the object.
pub(crate) fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, raw = %raw, "Judge output is not valid structured JSON");
        LlmError::StructuredOutput {
            message: e.to_string(),
            raw: raw.to_string(),
        }
    })
}

/// Embedding model that splits large inputs into fixed-size batches.
pub struct NvidiaEmbeddingModel {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl NvidiaEmbeddingModel {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingModel for NvidiaEmbeddingModel {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.backend
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Embedding service returned no vector".to_string(),
            })
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.backend.embed(batch).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
