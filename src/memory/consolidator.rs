// src/memory/consolidator.rs
// Reconciles candidate facts with similar existing memories: supersede,
// drop, or add. Applying the plan is idempotent so extraction jobs can
// replay safely.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chat::prompts;
use crate::error::{EngramError, Result};
use crate::llm::{Embedder, LanguageModel};
use crate::memory::retriever::Retriever;
use crate::memory::store::VectorStore;
use crate::memory::types::{
    consolidation_schema, ConsolidationItem, ConsolidationResponse, ExtractedFact,
    MemoryAttributes, MemoryPatch, MemoryRecord, MemoryStatus,
};

pub struct Consolidator {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    search_limit: usize,
}

impl Consolidator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        search_limit: usize,
    ) -> Self {
        let retriever = Retriever::new(embedder.clone(), store.clone());
        Self {
            llm,
            embedder,
            store,
            retriever,
            search_limit,
        }
    }

    /// Consolidate freshly extracted facts against the user's existing
    /// memories and write the outcome to the store. Returns the applied
    /// entries.
    pub async fn process(
        &self,
        user_id: &str,
        candidates: Vec<ExtractedFact>,
    ) -> Result<Vec<ConsolidationItem>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let new_items: Vec<ConsolidationItem> = candidates
            .into_iter()
            .map(|fact| ConsolidationItem {
                id: uuid::Uuid::new_v4().to_string(),
                content: fact.content,
                attributes: MemoryAttributes::active(fact.attributes.memory_type),
            })
            .collect();

        let existing = self.find_similar(user_id, &new_items).await?;

        let plan = if existing.is_empty() {
            debug!("no similar existing memories, storing candidates directly");
            new_items
        } else {
            self.resolve(&existing, &new_items).await?
        };

        self.apply(user_id, &plan).await?;
        Ok(plan)
    }

    /// Gather existing memories similar to any candidate, deduplicated by id.
    async fn find_similar(
        &self,
        user_id: &str,
        candidates: &[ConsolidationItem],
    ) -> Result<Vec<ConsolidationItem>> {
        let mut existing = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for candidate in candidates {
            let similar = self
                .retriever
                .search(&candidate.content, user_id, self.search_limit)
                .await?;
            debug!(
                candidate = %candidate.id,
                found = similar.len(),
                "similarity lookup for consolidation"
            );
            for record in similar {
                if seen.insert(record.id.clone()) {
                    existing.push(ConsolidationItem::from_record(&record));
                }
            }
        }

        Ok(existing)
    }

    /// Ask the model which memories to add or update. An unusable response
    /// consolidates to nothing rather than risking duplicate facts.
    async fn resolve(
        &self,
        existing: &[ConsolidationItem],
        new_items: &[ConsolidationItem],
    ) -> Result<Vec<ConsolidationItem>> {
        let existing_lines = to_json_lines(existing)?;
        let new_lines = to_json_lines(new_items)?;
        let input = format!("EXISTING:\n{}\nNEW:\n{}", existing_lines, new_lines);

        let raw = match self
            .llm
            .generate_structured(
                prompts::MEMORY_CONSOLIDATION,
                &input,
                "memory_consolidation",
                &consolidation_schema(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(EngramError::LlmParse(e)) => {
                warn!("consolidation output unusable, applying nothing: {}", e);
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };

        let response: ConsolidationResponse = match serde_json::from_value(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("consolidation output did not match schema, applying nothing: {}", e);
                return Ok(Vec::new());
            }
        };

        Ok(response.memories)
    }

    /// Write the plan: tombstones are attribute-only updates (content and
    /// vector freeze at that moment); active entries insert, falling back to
    /// update when the id already exists so replays converge.
    async fn apply(&self, user_id: &str, plan: &[ConsolidationItem]) -> Result<()> {
        let mut inserted = 0usize;
        let mut updated = 0usize;

        for item in plan {
            match item.attributes.status {
                MemoryStatus::Outdated => {
                    let patch = MemoryPatch {
                        attributes: Some(item.attributes.clone()),
                        ..Default::default()
                    };
                    match self.store.update(&item.id, patch).await {
                        Ok(()) => updated += 1,
                        Err(EngramError::NotFound(_)) => {
                            warn!(id = %item.id, "tombstone target missing, skipping");
                        }
                        Err(other) => return Err(other),
                    }
                }
                MemoryStatus::Active => {
                    let vector = self.embedder.embed(&item.content).await?;
                    let record = MemoryRecord {
                        id: item.id.clone(),
                        user_id: user_id.to_string(),
                        content: item.content.clone(),
                        vector: Some(vector.clone()),
                        attributes: item.attributes.clone(),
                        created_at: chrono::Utc::now(),
                        updated_at: chrono::Utc::now(),
                    };
                    match self.store.insert(&record).await {
                        Ok(()) => inserted += 1,
                        Err(EngramError::Conflict(_)) => {
                            let patch = MemoryPatch {
                                content: Some(item.content.clone()),
                                vector: Some(vector),
                                attributes: Some(item.attributes.clone()),
                            };
                            self.store.update(&item.id, patch).await?;
                            updated += 1;
                        }
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        info!(user_id = %user_id, inserted, updated, "applied consolidation plan");
        Ok(())
    }
}

fn to_json_lines(items: &[ConsolidationItem]) -> Result<String> {
    let lines: Vec<String> = items
        .iter()
        .map(|item| serde_json::to_string(item).map_err(EngramError::from))
        .collect::<Result<_>>()?;
    Ok(lines.join("\n"))
}
