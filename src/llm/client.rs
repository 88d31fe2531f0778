// src/llm/client.rs
// OpenAI chat completions provider: free-form, structured (JSON schema) and
// streaming variants over the same endpoint.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatTurn, LanguageModel};
use crate::config::LlmConfig;
use crate::error::{EngramError, Result};

const BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(EngramError::Config("OpenAI API key is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn build_messages(instructions: &str, input: &[ChatTurn]) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(input.len() + 1);
        messages.push(ChatTurn::new("system", instructions));
        messages.extend(input.iter().cloned());
        messages
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", BASE_URL))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(EngramError::Transient(format!(
                    "openai api returned {}: {}",
                    status, body
                )));
            }
            return Err(EngramError::Store(format!(
                "openai api returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn generate(&self, instructions: &str, input: &[ChatTurn]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(instructions, input),
            response_format: None,
            stream: None,
        };

        debug!(model = %self.model, messages = request.messages.len(), "chat completion");

        let response: ChatCompletionResponse = self.send(&request).await?.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngramError::LlmParse("no choices in response".to_string()))?;

        Ok(content)
    }

    async fn generate_structured(
        &self,
        instructions: &str,
        input: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(instructions, &[ChatTurn::new("user", input)]),
            response_format: Some(serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema,
                }
            })),
            stream: None,
        };

        debug!(model = %self.model, schema = schema_name, "structured completion");

        let response: ChatCompletionResponse = self.send(&request).await?.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngramError::LlmParse("no choices in response".to_string()))?;

        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| EngramError::LlmParse(format!("invalid JSON from model: {}", e)))?;

        Ok(parsed)
    }

    async fn generate_stream(
        &self,
        instructions: &str,
        input: &[ChatTurn],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(instructions, input),
            response_format: None,
            stream: Some(true),
        };

        let response = self.send(&request).await?;
        let mut bytes = response.bytes_stream();

        // SSE frames can split across network chunks; carry the tail until a
        // full "data: ..." line is available.
        let stream = try_stream! {
            let mut carry = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(EngramError::from)?;
                carry.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = carry.find('\n') {
                    let line = carry[..pos].trim().to_string();
                    carry.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        continue;
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(data) {
                        Ok(parsed) => {
                            if let Some(delta) = parsed
                                .choices
                                .first()
                                .and_then(|c| c.delta.content.clone())
                            {
                                yield delta;
                            }
                        }
                        Err(e) => warn!("skipping malformed stream chunk: {}", e),
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}
