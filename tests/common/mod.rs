// tests/common/mod.rs
// Deterministic doubles for the engine's seams: a scripted LLM, a hashing
// embedder and an in-memory vector store that honors the full ordering
// contract.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use engram::config::{
    Config, DatabaseConfig, EmbeddingConfig, JobsConfig, LlmConfig, MemoryConfig, QdrantConfig,
    ServerConfig, SidecarConfig,
};
use engram::error::{EngramError, Result};
use engram::llm::{ChatTurn, Embedder, LanguageModel};
use engram::memory::store::{sort_search_results, validate_search_k, VectorStore};
use engram::memory::{MemoryPatch, MemoryRecord};
use engram::session::SessionStore;
use engram::AppState;

// ---------------------------------------------------------------------------
// Config

pub fn test_config() -> Config {
    Config {
        llm: LlmConfig {
            api_key: "test-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        },
        embedding: EmbeddingConfig {
            model: "hash-embedder".to_string(),
            dimensions: 8,
            timeout_secs: 30,
        },
        memory: MemoryConfig {
            memory_search_limit: 10,
            message_limit: 20,
            summary_threshold: 10,
        },
        qdrant: QdrantConfig {
            url: "http://localhost:6334".to_string(),
            collection: "memories_test".to_string(),
            timeout_secs: 10,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_message_chars: 32_768,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        jobs: JobsConfig {
            worker_count: 2,
            max_retries: 3,
            retry_backoff_secs: 0,
        },
        sidecar: SidecarConfig {
            knowledge_graph_url: None,
            telemetry_token: None,
        },
    }
}

pub async fn session_store() -> Arc<SessionStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    let store = SessionStore::new(pool);
    store.run_migrations().await.expect("migrations");
    Arc::new(store)
}

// ---------------------------------------------------------------------------
// Embedder double

/// Deterministic embedder: equal texts map to equal vectors, distinct texts
/// to (almost surely) different directions.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dims: 8 }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = Vec::with_capacity(self.dims);
        for i in 0..self.dims {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            text.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let raw = hasher.finish();
            // map to [-1, 1)
            vector.push((raw % 2000) as f32 / 1000.0 - 1.0);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

// ---------------------------------------------------------------------------
// Vector store double

/// In-memory `VectorStore` implementing the exact search contract: active
/// only, per-user, ascending cosine distance, ties by recency then id.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: Mutex<HashMap<String, MemoryRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_user(&self, user_id: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    pub fn get(&self, id: &str) -> Option<MemoryRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert(&self, memory: &MemoryRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&memory.id) {
            return Err(EngramError::Conflict(format!(
                "memory {} already exists",
                memory.id
            )));
        }
        records.insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| EngramError::NotFound(format!("memory {}", id)))?;
        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(vector) = patch.vector {
            record.vector = Some(vector);
        }
        if let Some(attributes) = patch.attributes {
            record.attributes = attributes;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.lock().unwrap().remove(id);
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .retain(|_, r| r.user_id != user_id);
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        validate_search_k(k)?;

        let records = self.records.lock().unwrap();
        let mut scored: Vec<(f32, MemoryRecord)> = records
            .values()
            .filter(|r| r.user_id == user_id && r.is_active())
            .map(|r| {
                let similarity = r
                    .vector
                    .as_ref()
                    .map(|v| Self::cosine_similarity(v, query_vector))
                    .unwrap_or(0.0);
                let mut result = r.clone();
                result.vector = None;
                (similarity, result)
            })
            .collect();

        sort_search_results(&mut scored);
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    async fn get_by_user(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<MemoryRecord>> {
        let records = self.records.lock().unwrap();
        let mut results: Vec<MemoryRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| {
                let mut result = r.clone();
                result.vector = None;
                result
            })
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn health(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// LLM double

/// Scripted language model. Structured calls dispatch on the schema name;
/// queued responses pop in order with safe defaults when exhausted (no topic
/// change, empty extraction, empty consolidation).
pub struct ScriptedLlm {
    pub chat_reply: Mutex<String>,
    pub summary_replies: Mutex<VecDeque<String>>,
    pub topic_verdicts: Mutex<VecDeque<bool>>,
    pub extractions: Mutex<VecDeque<Result<Value>>>,
    pub consolidations: Mutex<VecDeque<Result<Value>>>,
    pub stream_chunks: Mutex<Vec<String>>,
    pub fail_stream_after: Mutex<Option<usize>>,
}

impl ScriptedLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chat_reply: Mutex::new("Understood!".to_string()),
            summary_replies: Mutex::new(VecDeque::new()),
            topic_verdicts: Mutex::new(VecDeque::new()),
            extractions: Mutex::new(VecDeque::new()),
            consolidations: Mutex::new(VecDeque::new()),
            stream_chunks: Mutex::new(vec!["Hello".to_string(), " there".to_string()]),
            fail_stream_after: Mutex::new(None),
        })
    }

    pub fn push_topic(&self, changed: bool) {
        self.topic_verdicts.lock().unwrap().push_back(changed);
    }

    pub fn push_extraction(&self, facts: Value) {
        self.extractions.lock().unwrap().push_back(Ok(facts));
    }

    pub fn push_extraction_error(&self, err: EngramError) {
        self.extractions.lock().unwrap().push_back(Err(err));
    }

    pub fn push_consolidation(&self, plan: Value) {
        self.consolidations.lock().unwrap().push_back(Ok(plan));
    }

    pub fn push_summary(&self, text: &str) {
        self.summary_replies
            .lock()
            .unwrap()
            .push_back(text.to_string());
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, instructions: &str, _input: &[ChatTurn]) -> Result<String> {
        if instructions.contains("conversation summarizer") {
            let scripted = self.summary_replies.lock().unwrap().pop_front();
            return Ok(scripted
                .unwrap_or_else(|| "A summary of the conversation so far.".to_string()));
        }
        Ok(self.chat_reply.lock().unwrap().clone())
    }

    async fn generate_structured(
        &self,
        _instructions: &str,
        _input: &str,
        schema_name: &str,
        _schema: &Value,
    ) -> Result<Value> {
        match schema_name {
            "topic_change" => {
                let verdict = self
                    .topic_verdicts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(false);
                Ok(json!({ "topic_changed": verdict }))
            }
            "memory_extraction" => self
                .extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "memories": [] }))),
            "memory_consolidation" => self
                .consolidations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "memories": [] }))),
            other => Err(EngramError::LlmParse(format!(
                "unexpected schema {}",
                other
            ))),
        }
    }

    async fn generate_stream(
        &self,
        _instructions: &str,
        _input: &[ChatTurn],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let chunks = self.stream_chunks.lock().unwrap().clone();
        let fail_after = *self.fail_stream_after.lock().unwrap();

        let items: Vec<Result<String>> = match fail_after {
            Some(n) => chunks
                .into_iter()
                .take(n)
                .map(Ok)
                .chain(std::iter::once(Err(EngramError::Transient(
                    "client disconnected".to_string(),
                ))))
                .collect(),
            None => chunks.into_iter().map(Ok).collect(),
        };

        Ok(stream::iter(items).boxed())
    }
}

// ---------------------------------------------------------------------------
// Full-state assembly

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub llm: Arc<ScriptedLlm>,
    pub memories: Arc<MemoryVectorStore>,
    pub sessions: Arc<SessionStore>,
    pub embedder: Arc<HashEmbedder>,
}

pub async fn harness() -> TestHarness {
    harness_with_config(test_config()).await
}

pub async fn harness_with_config(config: Config) -> TestHarness {
    let llm = ScriptedLlm::new();
    let memories = Arc::new(MemoryVectorStore::new());
    let sessions = session_store().await;
    let embedder = Arc::new(HashEmbedder::new());

    let state = AppState::build(
        config,
        llm.clone(),
        embedder.clone(),
        memories.clone(),
        sessions.clone(),
    );

    TestHarness {
        state,
        llm,
        memories,
        sessions,
        embedder,
    }
}

/// Poll until a session reaches the expected message count; detached
/// post-stream work has no completion handle to await.
pub async fn wait_for_message_count(sessions: &SessionStore, session_id: &str, expected: i64) {
    for _ in 0..200 {
        if let Ok(count) = sessions.message_count(session_id).await {
            if count >= expected {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!(
        "timed out waiting for session {} to reach {} messages",
        session_id, expected
    );
}
