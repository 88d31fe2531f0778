// src/config/mod.rs
// Central configuration - composed from per-domain structs, wired by
// constructor injection at process start (no module-level singleton).

pub mod helpers;
pub mod llm;
pub mod memory;
pub mod server;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use llm::{EmbeddingConfig, LlmConfig};
pub use memory::{MemoryConfig, QdrantConfig, MAX_SEARCH_LIMIT};
pub use server::{DatabaseConfig, JobsConfig, ServerConfig, SidecarConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub qdrant: QdrantConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub sidecar: SidecarConfig,
}

impl Config {
    pub fn from_env() -> Self {
        // .env is optional in production
        dotenvy::dotenv().ok();

        Self {
            llm: LlmConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            memory: MemoryConfig::from_env(),
            qdrant: QdrantConfig::from_env(),
            server: ServerConfig::from_env(),
            database: DatabaseConfig::from_env(),
            jobs: JobsConfig::from_env(),
            sidecar: SidecarConfig::from_env(),
        }
    }

    /// Validate config on startup; a failure here aborts the process.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        Ok(())
    }
}
