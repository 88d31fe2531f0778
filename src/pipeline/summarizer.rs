// src/pipeline/summarizer.rs
// Rolling summary generation: previous summary + recent turns in, a
// replacement summary out.

use std::sync::Arc;
use tracing::debug;

use crate::chat::prompts;
use crate::error::Result;
use crate::llm::{ChatTurn, LanguageModel};
use crate::session::Message;

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Generate a summary that subsumes `existing_summary` and folds in the
    /// recent turns in order.
    pub async fn generate(
        &self,
        existing_summary: Option<&str>,
        recent: &[Message],
    ) -> Result<String> {
        let conversation: Vec<ChatTurn> = recent
            .iter()
            .map(|m| ChatTurn::new(m.role.clone(), m.content.clone()))
            .collect();

        let input = serde_json::json!({
            "existing_summary": existing_summary.unwrap_or("None"),
            "conversation": conversation,
        });

        debug!(turns = recent.len(), "generating rolling summary");

        let turn = ChatTurn::new("user", input.to_string());
        let response = self
            .llm
            .generate(prompts::CONVERSATION_SUMMARY, std::slice::from_ref(&turn))
            .await?;

        Ok(response.trim().to_string())
    }
}
