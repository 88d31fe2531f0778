// src/session/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat thread for one user. The watermarks and `message_count` together
/// are the single source of truth for what still needs background
/// processing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub message_count: i64,
    pub last_memory_processed_at: i64,
    pub last_summary_generated_at: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    /// 1-based append index within the session.
    pub seq: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only summary history; the current summary is the most recent and
/// is also denormalized onto the session row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SummaryRecord {
    pub id: String,
    pub session_id: String,
    pub content: String,
    /// Embedding of `content`, JSON-encoded.
    pub vector: String,
    pub message_count_at_creation: i64,
    pub created_at: DateTime<Utc>,
}

impl SummaryRecord {
    pub fn decode_vector(&self) -> Option<Vec<f32>> {
        serde_json::from_str(&self.vector).ok()
    }
}
