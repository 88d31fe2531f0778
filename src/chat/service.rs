// src/chat/service.rs
// Retrieval-augmented chat: assembles (memories, summary, recent window),
// generates, persists both turns and hands the session to the lifecycle
// coordinator. Batched and streaming variants share the same assembly and
// post-turn hooks.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chat::prompts;
use crate::error::{EngramError, Result};
use crate::llm::{ChatTurn, LanguageModel};
use crate::memory::Retriever;
use crate::pipeline::LifecycleCoordinator;
use crate::session::{derive_title, SessionStore};

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub session_id: String,
    pub session_created: bool,
    pub memories_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted by the streaming variant, in order: an optional
/// `SessionCreated`, any number of `Content` deltas, then exactly one
/// `Complete` or `Error`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    SessionCreated {
        session_id: String,
    },
    Content {
        delta: String,
    },
    Complete {
        session_id: String,
        memories_used: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

struct TurnContext {
    session_id: String,
    session_created: bool,
    instructions: String,
    memories_used: Vec<String>,
}

pub struct ChatService {
    llm: Arc<dyn LanguageModel>,
    sessions: Arc<SessionStore>,
    retriever: Arc<Retriever>,
    coordinator: Arc<LifecycleCoordinator>,
    memory_search_limit: usize,
    message_limit: usize,
    max_message_chars: usize,
}

impl ChatService {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        sessions: Arc<SessionStore>,
        retriever: Arc<Retriever>,
        coordinator: Arc<LifecycleCoordinator>,
        memory_search_limit: usize,
        message_limit: usize,
        max_message_chars: usize,
    ) -> Self {
        Self {
            llm,
            sessions,
            retriever,
            coordinator,
            memory_search_limit,
            message_limit,
            max_message_chars,
        }
    }

    fn validate_message(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(EngramError::validation("message must not be empty"));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(EngramError::validation(format!(
                "message exceeds {} characters",
                self.max_message_chars
            )));
        }
        Ok(())
    }

    /// Resolve the session and build the generation instructions. Shared by
    /// both chat variants; refuses before any side effect other than
    /// session creation.
    async fn prepare(
        &self,
        user_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<TurnContext> {
        self.validate_message(message)?;

        let (session, session_created) = match session_id {
            Some(id) => (self.sessions.get_owned(id, user_id).await?, false),
            None => {
                let title = derive_title(message);
                (self.sessions.create(user_id, Some(&title)).await?, true)
            }
        };

        let memories = self
            .retriever
            .search(message, user_id, self.memory_search_limit)
            .await?;
        let memories_used: Vec<String> = memories.iter().map(|m| m.content.clone()).collect();

        let summary = self.sessions.get_summary(&session.session_id).await?;
        let recent = self
            .sessions
            .recent_messages(&session.session_id, self.message_limit)
            .await?;
        let recent_turns: Vec<ChatTurn> = recent
            .iter()
            .map(|m| ChatTurn::new(m.role.clone(), m.content.clone()))
            .collect();

        let mut instructions = prompts::CHAT_SYSTEM.to_string();
        instructions.push_str(&format!(
            "\nMEMORIES: {}",
            serde_json::to_string(&memories_used).unwrap_or_else(|_| "[]".to_string())
        ));
        instructions.push_str(&format!(
            "\nSUMMARY: {}",
            summary.as_deref().unwrap_or("None")
        ));
        instructions.push_str(&format!(
            "\nSESSION CONTEXT: {}",
            serde_json::to_string(&recent_turns).unwrap_or_else(|_| "[]".to_string())
        ));

        debug!(
            session_id = %session.session_id,
            memories = memories_used.len(),
            recent = recent_turns.len(),
            has_summary = summary.is_some(),
            "assembled chat context"
        );

        Ok(TurnContext {
            session_id: session.session_id,
            session_created,
            instructions,
            memories_used,
        })
    }

    /// Persist both turns and evaluate the session. Runs after generation in
    /// both variants, including after a cancelled stream.
    async fn finish_turn(
        sessions: &SessionStore,
        coordinator: &LifecycleCoordinator,
        user_id: &str,
        session_id: &str,
        user_message: &str,
        request_ts: DateTime<Utc>,
        assistant_text: &str,
        assistant_ts: DateTime<Utc>,
    ) -> Result<()> {
        sessions
            .append_message(session_id, "user", user_message, request_ts)
            .await?;
        sessions
            .append_message(session_id, "assistant", assistant_text, assistant_ts)
            .await?;

        let outcome = coordinator.on_turn(user_id, session_id).await?;
        debug!(session_id = %session_id, ?outcome, "post-turn evaluation");
        Ok(())
    }

    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        request_ts: DateTime<Utc>,
        session_id: Option<&str>,
    ) -> Result<ChatOutcome> {
        let ctx = self.prepare(user_id, message, session_id).await?;

        let response = self
            .llm
            .generate(&ctx.instructions, &[ChatTurn::new("user", message)])
            .await?;
        let timestamp = Utc::now();

        Self::finish_turn(
            &self.sessions,
            &self.coordinator,
            user_id,
            &ctx.session_id,
            message,
            request_ts,
            &response,
            timestamp,
        )
        .await?;

        Ok(ChatOutcome {
            response,
            session_id: ctx.session_id,
            session_created: ctx.session_created,
            memories_used: ctx.memories_used,
            timestamp,
        })
    }

    /// Streaming variant. The returned channel yields events as the model
    /// produces them; the post-turn append and coordinator call happen in a
    /// detached task once the stream terminates, so a client disconnect
    /// still leaves the partial assistant text in the session.
    pub async fn chat_stream(
        &self,
        user_id: &str,
        message: &str,
        request_ts: DateTime<Utc>,
        session_id: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let ctx = self.prepare(user_id, message, session_id).await?;

        let mut llm_stream = self
            .llm
            .generate_stream(&ctx.instructions, &[ChatTurn::new("user", message)])
            .await?;

        let (tx, rx) = mpsc::channel(64);
        let sessions = Arc::clone(&self.sessions);
        let coordinator = Arc::clone(&self.coordinator);
        let user_id = user_id.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            if ctx.session_created {
                let _ = tx
                    .send(StreamEvent::SessionCreated {
                        session_id: ctx.session_id.clone(),
                    })
                    .await;
            }

            let mut full_response = String::new();
            let mut stream_error: Option<String> = None;

            while let Some(chunk) = llm_stream.next().await {
                match chunk {
                    Ok(delta) => {
                        full_response.push_str(&delta);
                        if tx.send(StreamEvent::Content { delta }).await.is_err() {
                            // Client disconnected: stop pulling the upstream
                            // stream, keep what arrived so far.
                            warn!(session_id = %ctx.session_id, "client gone, cancelling stream");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %ctx.session_id, "stream interrupted: {}", e);
                        stream_error = Some(e.to_string());
                        break;
                    }
                }
            }
            drop(llm_stream);

            let timestamp = Utc::now();
            if let Err(e) = Self::finish_turn(
                &sessions,
                &coordinator,
                &user_id,
                &ctx.session_id,
                &message,
                request_ts,
                &full_response,
                timestamp,
            )
            .await
            {
                error!(session_id = %ctx.session_id, "post-stream turn handling failed: {}", e);
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }

            let event = match stream_error {
                Some(message) => StreamEvent::Error { message },
                None => StreamEvent::Complete {
                    session_id: ctx.session_id.clone(),
                    memories_used: ctx.memories_used,
                    timestamp,
                },
            };
            let _ = tx.send(event).await;
            info!(session_id = %ctx.session_id, chars = full_response.len(), "stream turn finished");
        });

        Ok(rx)
    }
}
