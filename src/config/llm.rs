// src/config/llm.rs
// LLM and embedding model configuration

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};

/// OpenAI chat model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    /// Per-call timeout for chat completions, seconds.
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: super::helpers::env_or("OPENAI_API_KEY", ""),
            model: super::helpers::env_or("ENGRAM_MODEL", "gpt-4o-mini"),
            timeout_secs: super::helpers::env_parsed("ENGRAM_LLM_TIMEOUT_SECS", 30),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(EngramError::Config(
                "OPENAI_API_KEY is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embedding model configuration. The dimension is fixed at init for the
/// lifetime of a deployment; writes and queries must use the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            model: super::helpers::env_or("ENGRAM_EMBED_MODEL", "text-embedding-3-small"),
            dimensions: super::helpers::env_parsed("ENGRAM_EMBED_DIMENSIONS", 1536),
            timeout_secs: super::helpers::env_parsed("ENGRAM_EMBED_TIMEOUT_SECS", 30),
        }
    }
}
