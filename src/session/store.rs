// src/session/store.rs
// Sessions, messages, summaries and processing watermarks on SQLite.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{EngramError, Result};
use crate::session::types::{Message, Session, SummaryRecord};

/// Max stored title length, characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Chars of the first message used when deriving a session title.
const TITLE_PREFIX_CHARS: usize = 50;

pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| EngramError::Config(format!("invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!("session store connected: {}", config.url);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                message_count INTEGER NOT NULL DEFAULT 0,
                last_memory_processed_at INTEGER NOT NULL DEFAULT 0,
                last_summary_generated_at INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
                seq INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(session_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                vector TEXT NOT NULL,
                message_count_at_creation INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session_seq ON messages(session_id, seq)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, last_activity)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_summaries_session ON summaries(session_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create(&self, user_id: &str, title: Option<&str>) -> Result<Session> {
        let title = match title {
            Some(t) => validate_title(t)?,
            None => format!("Session {}", Utc::now().format("%b %d, %Y")),
        };

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, title, message_count,
                last_memory_processed_at, last_summary_generated_at, created_at, last_activity)
            VALUES (?, ?, ?, 0, 0, 0, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(&title)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(session_id = %session_id, user_id = %user_id, "created session");
        self.get(&session_id).await
    }

    /// Missing and foreign sessions are indistinguishable to callers; both
    /// surface as `NotFound`.
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        let session: Option<Session> = sqlx::query_as(
            r#"
            SELECT session_id, user_id, title, summary, message_count,
                   last_memory_processed_at, last_summary_generated_at,
                   created_at, last_activity
            FROM sessions WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        session.ok_or_else(|| EngramError::not_found(format!("session {}", session_id)))
    }

    /// Ownership check for path-scoped handlers: the same `NotFound` comes
    /// back whether the session is missing or belongs to someone else.
    pub async fn get_owned(&self, session_id: &str, user_id: &str) -> Result<Session> {
        let session = self.get(session_id).await?;
        if session.user_id != user_id {
            return Err(EngramError::not_found(format!("session {}", session_id)));
        }
        Ok(session)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as(
            r#"
            SELECT session_id, user_id, title, summary, message_count,
                   last_memory_processed_at, last_summary_generated_at,
                   created_at, last_activity
            FROM sessions WHERE user_id = ?
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Deletes the session and cascades to its messages and summaries.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM summaries WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngramError::not_found(format!("session {}", session_id)));
        }

        tx.commit().await?;
        info!(session_id = %session_id, "deleted session");
        Ok(())
    }

    pub async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let title = validate_title(title)?;
        let result = sqlx::query(
            "UPDATE sessions SET title = ?, last_activity = ? WHERE session_id = ?",
        )
        .bind(&title)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngramError::not_found(format!("session {}", session_id)));
        }
        Ok(())
    }

    /// Atomically appends a message, bumping `message_count` and
    /// `last_activity`. Returns the new 1-based message index.
    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        ts: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let count: Option<(i64,)> =
            sqlx::query_as("SELECT message_count FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((count,)) = count else {
            return Err(EngramError::not_found(format!("session {}", session_id)));
        };
        let seq = count + 1;

        sqlx::query(
            "INSERT INTO messages (id, session_id, seq, role, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(seq)
        .bind(role)
        .bind(content)
        .bind(ts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE sessions SET message_count = ?, last_activity = ? WHERE session_id = ?",
        )
        .bind(seq)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(session_id = %session_id, seq, role, "appended message");
        Ok(seq)
    }

    /// Messages with index strictly greater than `index`, in order.
    pub async fn messages_since(&self, session_id: &str, index: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as(
            r#"
            SELECT id, session_id, seq, role, content, created_at
            FROM messages WHERE session_id = ? AND seq > ?
            ORDER BY seq
            "#,
        )
        .bind(session_id)
        .bind(index)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Last `n` messages, returned in chronological order.
    pub async fn recent_messages(&self, session_id: &str, n: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = sqlx::query_as(
            r#"
            SELECT id, session_id, seq, role, content, created_at
            FROM messages WHERE session_id = ?
            ORDER BY seq DESC LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn all_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.messages_since(session_id, 0).await
    }

    pub async fn message_count(&self, session_id: &str) -> Result<i64> {
        Ok(self.get(session_id).await?.message_count)
    }

    pub async fn last_memory_processed_at(&self, session_id: &str) -> Result<i64> {
        Ok(self.get(session_id).await?.last_memory_processed_at)
    }

    pub async fn last_summary_generated_at(&self, session_id: &str) -> Result<i64> {
        Ok(self.get(session_id).await?.last_summary_generated_at)
    }

    pub async fn get_summary(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.get(session_id).await?.summary)
    }

    /// Monotonic: concurrent advances collapse to their max; a lower value
    /// is a no-op.
    pub async fn advance_memory_watermark(&self, session_id: &str, index: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET last_memory_processed_at = MAX(last_memory_processed_at, ?) WHERE session_id = ?",
        )
        .bind(index)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngramError::not_found(format!("session {}", session_id)));
        }
        debug!(session_id = %session_id, index, "advanced memory watermark");
        Ok(())
    }

    /// Stores the new summary (history record + denormalized session field)
    /// atomically with the watermark advance. Stale advances are no-ops.
    pub async fn advance_summary_watermark(
        &self,
        session_id: &str,
        index: i64,
        summary_text: &str,
        summary_vector: &[f32],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sessions SET last_summary_generated_at = ?, summary = ?
            WHERE session_id = ? AND last_summary_generated_at < ?
            "#,
        )
        .bind(index)
        .bind(summary_text)
        .bind(session_id)
        .bind(index)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Either the session is gone or a newer summary already landed.
            self.get(session_id).await?;
            debug!(session_id = %session_id, index, "summary watermark already past index");
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO summaries (id, session_id, content, vector, message_count_at_creation, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(summary_text)
        .bind(serde_json::to_string(summary_vector).unwrap_or_else(|_| "[]".to_string()))
        .bind(index)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(session_id = %session_id, index, "stored summary and advanced watermark");
        Ok(())
    }

    pub async fn latest_summary_record(&self, session_id: &str) -> Result<Option<SummaryRecord>> {
        let record = sqlx::query_as(
            r#"
            SELECT id, session_id, content, vector, message_count_at_creation, created_at
            FROM summaries WHERE session_id = ?
            ORDER BY message_count_at_creation DESC, created_at DESC LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn summary_count(&self, session_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM summaries WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn health(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(EngramError::validation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(EngramError::validation(format!(
            "title exceeds {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

/// Derive a session title from the first message: leading characters,
/// whitespace-collapsed, with an ellipsis when truncated.
pub fn derive_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    let prefix: String = trimmed.chars().take(TITLE_PREFIX_CHARS).collect();
    let mut title = prefix.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.chars().count() > TITLE_PREFIX_CHARS {
        title.push_str("...");
    }
    if title.is_empty() {
        format!("Session {}", Utc::now().format("%b %d"))
    } else {
        title
    }
}
