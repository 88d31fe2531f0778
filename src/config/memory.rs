// src/config/memory.rs
// Memory pipeline and vector database configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard ceiling on `k` for vector searches.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Memory lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Top-K for retrieval and for the consolidator's similarity lookups.
    pub memory_search_limit: usize,
    /// Recent-messages window for chat context and summarization input.
    pub message_limit: usize,
    /// A new summary is due once this many messages accumulated past the
    /// last one.
    pub summary_threshold: usize,
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        let mut memory_search_limit: usize =
            super::helpers::env_parsed("ENGRAM_MEMORY_SEARCH_LIMIT", 10);
        if memory_search_limit == 0 || memory_search_limit > MAX_SEARCH_LIMIT {
            warn!(
                "ENGRAM_MEMORY_SEARCH_LIMIT out of range, clamping to {}",
                MAX_SEARCH_LIMIT
            );
            memory_search_limit = memory_search_limit.clamp(1, MAX_SEARCH_LIMIT);
        }

        Self {
            memory_search_limit,
            message_limit: super::helpers::env_parsed("ENGRAM_MESSAGE_LIMIT", 20),
            summary_threshold: super::helpers::env_parsed("ENGRAM_SUMMARY_THRESHOLD", 10),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_search_limit: 10,
            message_limit: 20,
            summary_threshold: 10,
        }
    }
}

/// Qdrant vector database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl QdrantConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("QDRANT_URL", "http://localhost:6334"),
            collection: super::helpers::env_or("QDRANT_COLLECTION", "memories"),
            timeout_secs: super::helpers::env_parsed("QDRANT_TIMEOUT_SECS", 10),
        }
    }
}
