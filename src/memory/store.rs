// src/memory/store.rs
// VectorStore seam and its Qdrant-backed implementation.
// The store is the sole authority on memory identity and ordering; callers
// never generate vectors for reads except through the Embedder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{QdrantConfig, MAX_SEARCH_LIMIT};
use crate::error::{EngramError, Result};
use crate::memory::types::{MemoryAttributes, MemoryPatch, MemoryRecord, MemoryStatus};

/// Per-user ANN store of memory records.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a new memory; fails with `Conflict` if the id already exists.
    async fn insert(&self, memory: &MemoryRecord) -> Result<()>;

    /// Partial update; bumps `updated_at`; fails with `NotFound` if absent.
    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Purge every memory belonging to one user.
    async fn delete_all(&self, user_id: &str) -> Result<()>;

    /// Up to `k` active memories for `user_id`, ascending cosine distance to
    /// `query_vector`; ties break on `updated_at` descending then `id`
    /// lexicographic. `1 <= k <= 50`. Result vectors are omitted.
    async fn search(&self, user_id: &str, query_vector: &[f32], k: usize)
        -> Result<Vec<MemoryRecord>>;

    /// All memories for a user, `created_at` descending.
    async fn get_by_user(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<MemoryRecord>>;

    async fn health(&self) -> bool;
}

pub fn validate_search_k(k: usize) -> Result<()> {
    if k == 0 || k > MAX_SEARCH_LIMIT {
        return Err(EngramError::validation(format!(
            "search limit must be between 1 and {}, got {}",
            MAX_SEARCH_LIMIT, k
        )));
    }
    Ok(())
}

/// Deterministic result ordering: ascending distance (descending similarity
/// score), then `updated_at` descending, then `id` lexicographic.
pub fn sort_search_results(results: &mut [(f32, MemoryRecord)]) {
    results.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub struct QdrantMemoryStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
}

impl QdrantMemoryStore {
    pub async fn new(config: &QdrantConfig, dimensions: usize) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .skip_compatibility_check()
            .build()
            .map_err(|e| EngramError::Config(format!("failed to connect to Qdrant: {}", e)))?;

        let store = Self {
            client,
            collection: config.collection.clone(),
            dimensions,
        };
        store.ensure_collection().await?;

        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;

        if !exists {
            info!("creating Qdrant collection: {}", self.collection);
            let result = self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimensions as u64, Distance::Cosine),
                    ),
                )
                .await;

            if let Err(e) = result {
                // Another process may have created it between the exists
                // check and the create call.
                if e.to_string().contains("already exists") {
                    debug!("collection {} created concurrently", self.collection);
                } else {
                    return Err(EngramError::Store(format!(
                        "failed to create collection {}: {}",
                        self.collection, e
                    )));
                }
            }
        }

        Ok(())
    }

    fn build_payload(record: &MemoryRecord) -> HashMap<String, QdrantValue> {
        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("user_id".to_string(), record.user_id.clone().into());
        payload.insert("content".to_string(), record.content.clone().into());
        payload.insert(
            "type".to_string(),
            record.attributes.memory_type.clone().into(),
        );
        payload.insert(
            "status".to_string(),
            record.attributes.status.as_str().to_string().into(),
        );
        payload.insert(
            "created_at".to_string(),
            record.created_at.to_rfc3339().into(),
        );
        payload.insert(
            "updated_at".to_string(),
            record.updated_at.to_rfc3339().into(),
        );
        payload
    }

    fn decode_payload(
        id: String,
        payload: &HashMap<String, QdrantValue>,
        vector: Option<Vec<f32>>,
    ) -> Option<MemoryRecord> {
        let user_id = payload.get("user_id")?.as_str()?.to_string();
        let content = payload.get("content")?.as_str()?.to_string();
        let memory_type = payload.get("type")?.as_str()?.to_string();
        let status = match payload.get("status")?.as_str()?.as_str() {
            "outdated" => MemoryStatus::Outdated,
            _ => MemoryStatus::Active,
        };
        let created_at = Self::decode_timestamp(payload.get("created_at")?)?;
        let updated_at = Self::decode_timestamp(payload.get("updated_at")?)?;

        Some(MemoryRecord {
            id,
            user_id,
            content,
            vector,
            attributes: MemoryAttributes {
                memory_type,
                status,
            },
            created_at,
            updated_at,
        })
    }

    fn decode_timestamp(value: &QdrantValue) -> Option<DateTime<Utc>> {
        let raw = value.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn decode_vector(vectors: Option<qdrant_client::qdrant::VectorsOutput>) -> Option<Vec<f32>> {
        use qdrant_client::qdrant::vector_output::Vector;
        use qdrant_client::qdrant::vectors_output::VectorsOptions;

        match vectors?.vectors_options? {
            VectorsOptions::Vector(vec) => match vec.into_vector() {
                Vector::Dense(dense) => Some(dense.data),
                _ => None,
            },
            _ => None,
        }
    }

    /// Fetch one point with payload and vector; `None` when absent.
    async fn fetch(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![PointId::from(id.to_string())])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };
        let vector = Self::decode_vector(point.vectors);
        Ok(Self::decode_payload(id.to_string(), &point.payload, vector))
    }

    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let vector = record.vector.clone().ok_or_else(|| {
            EngramError::Store(format!("memory {} has no vector", record.id))
        })?;
        if vector.len() != self.dimensions {
            return Err(EngramError::Store(format!(
                "memory {} vector has {} dims, store expects {}",
                record.id,
                vector.len(),
                self.dimensions
            )));
        }

        let point = PointStruct::new(record.id.clone(), vector, Self::build_payload(record));
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantMemoryStore {
    async fn insert(&self, memory: &MemoryRecord) -> Result<()> {
        if self.fetch(&memory.id).await?.is_some() {
            return Err(EngramError::Conflict(format!(
                "memory {} already exists",
                memory.id
            )));
        }
        self.upsert(memory).await?;
        debug!(id = %memory.id, user_id = %memory.user_id, "inserted memory");
        Ok(())
    }

    async fn update(&self, id: &str, patch: MemoryPatch) -> Result<()> {
        let mut record = self
            .fetch(id)
            .await?
            .ok_or_else(|| EngramError::not_found(format!("memory {}", id)))?;

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

        self.upsert(&record).await?;
        debug!(id = %id, "updated memory");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(vec![PointId::from(id.to_string())])
                    .wait(true),
            )
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        let filter = Filter::must([Condition::matches("user_id", user_id.to_string())]);
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;
        info!(user_id = %user_id, "deleted all memories");
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        validate_search_k(k)?;

        let filter = Filter::must([
            Condition::matches("user_id", user_id.to_string()),
            Condition::matches("status", MemoryStatus::Active.as_str().to_string()),
        ]);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), k as u64)
                    .filter(filter)
                    .with_payload(true),
            )
            .await
            .map_err(|e| EngramError::Transient(e.to_string()))?;

        let mut scored: Vec<(f32, MemoryRecord)> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = match point.id.as_ref()?.point_id_options.as_ref()? {
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u.clone(),
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
                };
                Self::decode_payload(id, &point.payload, None).map(|r| (point.score, r))
            })
            .collect();

        sort_search_results(&mut scored);

        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    async fn get_by_user(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<MemoryRecord>> {
        let filter = Filter::must([Condition::matches("user_id", user_id.to_string())]);

        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;
        let page: u32 = 100;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .filter(filter.clone())
                .limit(page)
                .with_payload(true)
                .with_vectors(false);
            if let Some(ref off) = offset {
                builder = builder.offset(off.clone());
            }

            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| EngramError::Transient(e.to_string()))?;

            if response.result.is_empty() {
                break;
            }

            let fetched = response.result.len();
            offset = response.result.last().and_then(|p| p.id.clone());

            for point in response.result {
                let Some(id) = point.id.as_ref().and_then(|id| {
                    match id.point_id_options.as_ref()? {
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => {
                            Some(u.clone())
                        }
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => {
                            Some(n.to_string())
                        }
                    }
                }) else {
                    continue;
                };
                if let Some(record) = Self::decode_payload(id, &point.payload, None) {
                    records.push(record);
                }
            }

            if fetched < page as usize {
                break;
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        Ok(records)
    }

    async fn health(&self) -> bool {
        match self.client.collection_exists(&self.collection).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("qdrant health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryAttributes;
    use chrono::Duration;

    fn record(id: &str, updated_offset_secs: i64) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            content: "fact".to_string(),
            vector: None,
            attributes: MemoryAttributes::active("personal"),
            created_at: now,
            updated_at: now + Duration::seconds(updated_offset_secs),
        }
    }

    #[test]
    fn k_bounds_enforced() {
        assert!(validate_search_k(0).is_err());
        assert!(validate_search_k(1).is_ok());
        assert!(validate_search_k(50).is_ok());
        assert!(validate_search_k(51).is_err());
    }

    #[test]
    fn ordering_is_distance_then_recency_then_id() {
        let mut results = vec![
            (0.5, record("b", 0)),
            (0.9, record("c", 0)),
            (0.5, record("a", 10)),
            (0.5, record("aa", 0)),
        ];
        sort_search_results(&mut results);
        let ids: Vec<&str> = results.iter().map(|(_, r)| r.id.as_str()).collect();
        // highest similarity first, then newest update, then lexicographic id
        assert_eq!(ids, vec!["c", "a", "aa", "b"]);
    }
}
