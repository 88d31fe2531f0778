// src/graph.rs
// Optional knowledge-graph sidecar. Saves are best-effort: failures are
// logged, never propagated.

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

use crate::llm::ChatTurn;

pub struct KnowledgeGraphClient {
    client: Client,
    base_url: String,
}

impl KnowledgeGraphClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST the processed chat window as personal memory.
    pub async fn save_personal_memory(
        &self,
        chat_history: &[ChatTurn],
        user_id: &str,
        session_id: &str,
    ) {
        let url = format!("{}/api/v1/save", self.base_url);
        let payload = json!({
            "input": chat_history,
            "metadata": {
                "user_id": user_id,
                "session_id": session_id,
            },
            "target_type": "personal_memory",
            "input_type": "chat_history",
        });

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(user_id = %user_id, session_id = %session_id, "saved personal memory to knowledge graph");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("knowledge graph api error: {} - {}", status, body);
            }
            Err(e) => {
                error!("failed to call knowledge graph api: {}", e);
            }
        }
    }
}
