// src/memory/retriever.rs
// Semantic retrieval used during chat and consolidation: embed the query,
// search the store, keep only active records, preserve store order.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::llm::Embedder;
use crate::memory::store::VectorStore;
use crate::memory::types::MemoryRecord;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Top-k active memories for `user_id` ranked by the store. Never
    /// re-embeds and never re-ranks.
    pub async fn search(&self, query: &str, user_id: &str, k: usize) -> Result<Vec<MemoryRecord>> {
        let vector = self.embedder.embed(query).await?;
        let results = self.store.search(user_id, &vector, k).await?;

        // The store already filters to active; keep the guard so a
        // non-conforming backend cannot leak tombstones into chat context.
        let results: Vec<MemoryRecord> =
            results.into_iter().filter(|m| m.is_active()).collect();

        debug!(user_id = %user_id, k, found = results.len(), "memory search");
        Ok(results)
    }
}
