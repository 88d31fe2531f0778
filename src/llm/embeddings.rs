// src/llm/embeddings.rs
// OpenAI embeddings provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{EngramError, Result};

const BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: EmbeddingUsage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/embeddings", BASE_URL)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("generating embedding for text ({} chars)", text.len());

        let request = EmbeddingRequest {
            input: text.to_string(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(EngramError::Transient(format!(
                    "embeddings api returned {}: {}",
                    status, body
                )));
            }
            return Err(EngramError::Store(format!(
                "embeddings api returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response.json().await?;
        let embedding = result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EngramError::LlmParse("no embedding in response".to_string()))?;

        debug!(
            "embedding generated: {} dims, {} tokens",
            embedding.len(),
            result.usage.total_tokens
        );

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_construction() {
        let config = EmbeddingConfig {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
        };
        let provider = OpenAiEmbeddings::new("test-key".to_string(), &config).unwrap();
        assert_eq!(provider.api_url(), "https://api.openai.com/v1/embeddings");
        assert_eq!(provider.dimensions(), 1536);
    }
}
