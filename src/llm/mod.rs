// src/llm/mod.rs
// Seams for the chat LLM and the embedding provider.
// Business logic only sees these traits; production wiring injects the
// OpenAI-backed clients, tests inject scripted doubles.

pub mod client;
pub mod embeddings;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use client::OpenAiClient;
pub use embeddings::OpenAiEmbeddings;

/// One turn of a conversation as sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Chat completion provider. Instructions and input are separate parameters
/// on every call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-form completion returning the assistant text.
    async fn generate(&self, instructions: &str, input: &[ChatTurn]) -> Result<String>;

    /// Structured completion returning JSON conforming to the caller-supplied
    /// schema. Schema violations surface as `LlmParse`.
    async fn generate_structured(
        &self,
        instructions: &str,
        input: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value>;

    /// Streaming completion; yields text deltas as they arrive.
    async fn generate_stream(
        &self,
        instructions: &str,
        input: &[ChatTurn],
    ) -> Result<BoxStream<'static, Result<String>>>;
}

/// Text embedding provider. `dimensions()` is fixed at init and identical
/// for writes and queries; cross-dimension retrieval is undefined.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}
