// src/pipeline/topic.rs
// Binary topic-change classifier over a message window.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::chat::prompts;
use crate::llm::{ChatTurn, LanguageModel};
use crate::memory::types::{topic_schema, TopicChangedResponse};

pub struct TopicDetector {
    llm: Arc<dyn LanguageModel>,
}

impl TopicDetector {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// `true` when the window crossed into a different domain. Windows of
    /// fewer than two messages are trivially `false`, and so is any model
    /// failure: extraction must not trigger on ambiguity.
    pub async fn detect(&self, messages: &[ChatTurn]) -> bool {
        if messages.len() < 2 {
            return false;
        }

        let input = match serde_json::to_string(messages) {
            Ok(input) => input,
            Err(e) => {
                warn!("failed to encode window for topic detection: {}", e);
                return false;
            }
        };

        let raw = match self
            .llm
            .generate_structured(
                prompts::TOPIC_CHANGE_DETECTION,
                &input,
                "topic_change",
                &topic_schema(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("topic detection failed, assuming no change: {}", e);
                return false;
            }
        };

        match serde_json::from_value::<TopicChangedResponse>(raw) {
            Ok(response) => {
                debug!(topic_changed = response.topic_changed, "topic detection");
                response.topic_changed
            }
            Err(e) => {
                warn!("topic detection output unusable, assuming no change: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngramError, Result};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use serde_json::{json, Value};

    struct FixedLlm(Result<Value>);

    #[async_trait]
    impl LanguageModel for FixedLlm {
        async fn generate(&self, _: &str, _: &[ChatTurn]) -> Result<String> {
            unimplemented!()
        }

        async fn generate_structured(&self, _: &str, _: &str, _: &str, _: &Value) -> Result<Value> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(EngramError::Transient(e.to_string())),
            }
        }

        async fn generate_stream(
            &self,
            _: &str,
            _: &[ChatTurn],
        ) -> Result<BoxStream<'static, Result<String>>> {
            unimplemented!()
        }
    }

    fn window(n: usize) -> Vec<ChatTurn> {
        (0..n).map(|i| ChatTurn::new("user", format!("m{}", i))).collect()
    }

    #[tokio::test]
    async fn short_windows_never_change_topic() {
        let detector = TopicDetector::new(Arc::new(FixedLlm(Ok(json!({"topic_changed": true})))));
        assert!(!detector.detect(&window(0)).await);
        assert!(!detector.detect(&window(1)).await);
    }

    #[tokio::test]
    async fn model_verdict_is_returned() {
        let detector = TopicDetector::new(Arc::new(FixedLlm(Ok(json!({"topic_changed": true})))));
        assert!(detector.detect(&window(4)).await);

        let detector = TopicDetector::new(Arc::new(FixedLlm(Ok(json!({"topic_changed": false})))));
        assert!(!detector.detect(&window(4)).await);
    }

    #[tokio::test]
    async fn failures_fail_closed() {
        let detector =
            TopicDetector::new(Arc::new(FixedLlm(Err(EngramError::Transient("down".into())))));
        assert!(!detector.detect(&window(4)).await);
    }
}
