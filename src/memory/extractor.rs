// src/memory/extractor.rs
// Turns a message window into candidate facts via a structured LLM call.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::chat::prompts;
use crate::error::{EngramError, Result};
use crate::llm::{ChatTurn, LanguageModel};
use crate::memory::types::{extraction_schema, ExtractedFact, ExtractionResponse};

pub struct FactExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl FactExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Extract candidate facts from a window of turns. Only user and
    /// assistant turns contribute. An unusable model response yields an
    /// empty extraction; the job layer decides whether anything retries.
    pub async fn extract(&self, window: &[ChatTurn]) -> Result<Vec<ExtractedFact>> {
        let conversational: Vec<&ChatTurn> = window
            .iter()
            .filter(|t| t.role == "user" || t.role == "assistant")
            .collect();

        if conversational.is_empty() {
            return Ok(Vec::new());
        }

        let input = serde_json::to_string(&conversational)
            .map_err(|e| EngramError::Store(format!("failed to encode window: {}", e)))?;

        let raw = match self
            .llm
            .generate_structured(
                prompts::FACT_EXTRACTION,
                &input,
                "memory_extraction",
                &extraction_schema(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(EngramError::LlmParse(e)) => {
                warn!("extraction output unusable, treating as empty: {}", e);
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };

        let response: ExtractionResponse = match serde_json::from_value(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("extraction output did not match schema, treating as empty: {}", e);
                return Ok(Vec::new());
            }
        };

        debug!("extracted {} candidate facts", response.memories.len());
        Ok(response.memories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct StubLlm {
        structured: Mutex<Vec<Result<Value>>>,
        last_input: Mutex<Option<String>>,
    }

    impl StubLlm {
        fn returning(results: Vec<Result<Value>>) -> Self {
            Self {
                structured: Mutex::new(results),
                last_input: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for StubLlm {
        async fn generate(&self, _: &str, _: &[ChatTurn]) -> Result<String> {
            unimplemented!("not used by the extractor")
        }

        async fn generate_structured(
            &self,
            _: &str,
            input: &str,
            _: &str,
            _: &Value,
        ) -> Result<Value> {
            *self.last_input.lock().unwrap() = Some(input.to_string());
            self.structured.lock().unwrap().remove(0)
        }

        async fn generate_stream(
            &self,
            _: &str,
            _: &[ChatTurn],
        ) -> Result<BoxStream<'static, Result<String>>> {
            unimplemented!("not used by the extractor")
        }
    }

    #[tokio::test]
    async fn system_turns_are_excluded_from_the_model_input() {
        let llm = Arc::new(StubLlm::returning(vec![Ok(json!({"memories": []}))]));
        let extractor = FactExtractor::new(llm.clone());

        let window = vec![
            ChatTurn::new("system", "internal instructions"),
            ChatTurn::new("user", "my name is John"),
            ChatTurn::new("assistant", "hi John"),
        ];
        extractor.extract(&window).await.unwrap();

        let input = llm.last_input.lock().unwrap().clone().unwrap();
        assert!(!input.contains("internal instructions"));
        assert!(input.contains("my name is John"));
    }

    #[tokio::test]
    async fn parse_failure_yields_empty_extraction() {
        let llm = Arc::new(StubLlm::returning(vec![Err(EngramError::LlmParse(
            "not json".into(),
        ))]));
        let extractor = FactExtractor::new(llm);

        let window = vec![
            ChatTurn::new("user", "hello"),
            ChatTurn::new("assistant", "hi"),
        ];
        let facts = extractor.extract(&window).await.unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn transient_failure_propagates_for_retry() {
        let llm = Arc::new(StubLlm::returning(vec![Err(EngramError::Transient(
            "timeout".into(),
        ))]));
        let extractor = FactExtractor::new(llm);

        let window = vec![
            ChatTurn::new("user", "hello"),
            ChatTurn::new("assistant", "hi"),
        ];
        let err = extractor.extract(&window).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn facts_round_trip() {
        let llm = Arc::new(StubLlm::returning(vec![Ok(json!({
            "memories": [
                {"content": "Name is John", "attributes": {"type": "personal"}},
                {"content": "Prefers Japanese cuisine", "attributes": {"type": "preference"}}
            ]
        }))]));
        let extractor = FactExtractor::new(llm);

        let window = vec![
            ChatTurn::new("user", "my name is John and I love Japanese food"),
            ChatTurn::new("assistant", "noted!"),
        ];
        let facts = extractor.extract(&window).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].content, "Name is John");
        assert_eq!(facts[1].attributes.memory_type, "preference");
    }
}
