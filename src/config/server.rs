// src/config/server.rs
// HTTP server, database, jobs and sidecar configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single chat message, characters.
    pub max_message_chars: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("ENGRAM_HOST", "127.0.0.1"),
            port: super::helpers::env_parsed("ENGRAM_PORT", 3000),
            max_message_chars: super::helpers::env_parsed("ENGRAM_MAX_MESSAGE_CHARS", 32_768),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("DATABASE_URL", "sqlite://engram.db?mode=rwc"),
            max_connections: super::helpers::env_parsed("ENGRAM_SQLITE_MAX_CONNECTIONS", 5),
        }
    }
}

/// Background job dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub worker_count: usize,
    pub max_retries: u32,
    /// Initial retry backoff, seconds; doubles per attempt.
    pub retry_backoff_secs: u64,
}

impl JobsConfig {
    pub fn from_env() -> Self {
        Self {
            worker_count: super::helpers::env_parsed("ENGRAM_WORKER_COUNT", 2),
            max_retries: super::helpers::env_parsed("ENGRAM_JOB_MAX_RETRIES", 3),
            retry_backoff_secs: super::helpers::env_parsed("ENGRAM_JOB_RETRY_BACKOFF_SECS", 60),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_retries: 3,
            retry_backoff_secs: 60,
        }
    }
}

/// Optional knowledge-graph sidecar; absent URL disables the feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub knowledge_graph_url: Option<String>,
    pub telemetry_token: Option<String>,
}

impl SidecarConfig {
    pub fn from_env() -> Self {
        Self {
            knowledge_graph_url: super::helpers::env_opt("KNOWLEDGE_GRAPH_URL"),
            telemetry_token: super::helpers::env_opt("ENGRAM_TELEMETRY_TOKEN"),
        }
    }
}
