// src/pipeline/coordinator.rs
// Evaluates a session after each completed turn and dispatches background
// work. The coordinator never advances watermarks itself.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::jobs::{ExtractionJob, Job, JobQueue, SummaryJob};
use crate::llm::ChatTurn;
use crate::pipeline::TopicDetector;
use crate::session::SessionStore;

/// What `on_turn` decided for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing unprocessed.
    NoWork,
    /// Fewer than two unprocessed messages; window still growing.
    NotReady,
    /// No topic change yet; the window keeps accumulating.
    NoChange,
    /// Extraction (and possibly summarization) enqueued.
    Dispatched,
}

pub struct LifecycleCoordinator {
    sessions: Arc<SessionStore>,
    detector: TopicDetector,
    queue: Arc<JobQueue>,
    config: MemoryConfig,
}

impl LifecycleCoordinator {
    pub fn new(
        sessions: Arc<SessionStore>,
        detector: TopicDetector,
        queue: Arc<JobQueue>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            sessions,
            detector,
            queue,
            config,
        }
    }

    /// Called after both the user and the assistant message of a turn have
    /// been appended.
    pub async fn on_turn(&self, user_id: &str, session_id: &str) -> Result<TurnOutcome> {
        let session = self.sessions.get(session_id).await?;
        let current = session.message_count;
        let processed = session.last_memory_processed_at;

        if current <= processed {
            debug!(session_id = %session_id, current, processed, "no unprocessed messages");
            return Ok(TurnOutcome::NoWork);
        }

        let window = self.sessions.messages_since(session_id, processed).await?;
        if window.len() < 2 {
            debug!(session_id = %session_id, window = window.len(), "window too small");
            return Ok(TurnOutcome::NotReady);
        }

        let turns: Vec<ChatTurn> = window
            .iter()
            .map(|m| ChatTurn::new(m.role.clone(), m.content.clone()))
            .collect();

        if !self.detector.detect(&turns).await {
            debug!(session_id = %session_id, "no topic change, window keeps growing");
            return Ok(TurnOutcome::NoChange);
        }

        info!(
            session_id = %session_id,
            window = turns.len(),
            target = current,
            "topic change detected, dispatching extraction"
        );
        self.queue.enqueue(Job::Extraction(ExtractionJob {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            window: turns,
            target_watermark: current,
        }));

        if Self::summary_due(&self.config, current, session.last_summary_generated_at) {
            info!(session_id = %session_id, target = current, "dispatching summarization");
            self.queue.enqueue(Job::Summary(SummaryJob {
                session_id: session_id.to_string(),
                target_watermark: current,
            }));
        }

        Ok(TurnOutcome::Dispatched)
    }

    /// The first summary waits for a full context window
    /// (`message_limit` messages); afterwards one is due every
    /// `summary_threshold` messages.
    fn summary_due(config: &MemoryConfig, current: i64, last_summarized: i64) -> bool {
        current >= config.message_limit as i64
            && current - last_summarized >= config.summary_threshold as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_gate_requires_full_window_first() {
        let config = MemoryConfig {
            memory_search_limit: 10,
            message_limit: 20,
            summary_threshold: 10,
        };
        let due = |current, last| LifecycleCoordinator::summary_due(&config, current, last);

        assert!(
            !due(10, 0),
            "threshold alone is not enough before the first window fills"
        );
        assert!(!due(19, 0));
        assert!(due(20, 0), "first summary at message_limit");
        assert!(!due(25, 20));
        assert!(due(30, 20), "then every summary_threshold messages");
    }
}
