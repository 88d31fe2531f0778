// tests/vector_store_contract.rs
// The VectorStore contract the rest of the engine relies on, exercised
// against the in-memory implementation the other suites use.

mod common;

use chrono::Utc;
use std::sync::Arc;

use common::{HashEmbedder, MemoryVectorStore};
use engram::error::EngramError;
use engram::llm::Embedder;
use engram::memory::store::VectorStore;
use engram::memory::{MemoryAttributes, MemoryPatch, MemoryRecord, MemoryStatus};

async fn record(
    embedder: &HashEmbedder,
    id: &str,
    user_id: &str,
    content: &str,
) -> MemoryRecord {
    MemoryRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        content: content.to_string(),
        vector: Some(embedder.embed(content).await.unwrap()),
        attributes: MemoryAttributes::active("personal"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn insert_then_get_by_user_round_trips() {
    let store = MemoryVectorStore::new();
    let embedder = HashEmbedder::new();

    let m = record(&embedder, "m1", "u1", "Name is John").await;
    store.insert(&m).await.unwrap();

    let all = store.get_by_user("u1", None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "m1");
    assert_eq!(all[0].content, "Name is John");
}

#[tokio::test]
async fn duplicate_insert_conflicts() {
    let store = MemoryVectorStore::new();
    let embedder = HashEmbedder::new();

    let m = record(&embedder, "m1", "u1", "Name is John").await;
    store.insert(&m).await.unwrap();
    let err = store.insert(&m).await.unwrap_err();
    assert!(matches!(err, EngramError::Conflict(_)));
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let store = MemoryVectorStore::new();
    let err = store
        .update("ghost", MemoryPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngramError::NotFound(_)));
}

#[tokio::test]
async fn updated_content_is_found_by_its_new_embedding() {
    // Invariant 5: update(m, content: c') then search(embed(c')) ranks m
    // first.
    let store = Arc::new(MemoryVectorStore::new());
    let embedder = HashEmbedder::new();

    let m = record(&embedder, "m1", "u1", "Likes black coffee").await;
    store.insert(&m).await.unwrap();
    store
        .insert(&record(&embedder, "m2", "u1", "Plays tennis on Sundays").await)
        .await
        .unwrap();

    let new_content = "Prefers green tea over coffee";
    store
        .update(
            "m1",
            MemoryPatch {
                content: Some(new_content.to_string()),
                vector: Some(embedder.embed(new_content).await.unwrap()),
                attributes: None,
            },
        )
        .await
        .unwrap();

    let query = embedder.embed(new_content).await.unwrap();
    let results = store.search("u1", &query, 1).await.unwrap();
    assert_eq!(results[0].id, "m1");
    assert_eq!(results[0].content, new_content);
}

#[tokio::test]
async fn search_is_scoped_to_user_and_active_status() {
    // Invariant 1: every result belongs to the queried user and is active.
    let store = MemoryVectorStore::new();
    let embedder = HashEmbedder::new();

    store
        .insert(&record(&embedder, "a1", "u1", "Name is John").await)
        .await
        .unwrap();
    let mut outdated = record(&embedder, "a2", "u1", "Name is Johnny").await;
    outdated.attributes.status = MemoryStatus::Outdated;
    store.insert(&outdated).await.unwrap();
    store
        .insert(&record(&embedder, "b1", "u2", "Name is Jane").await)
        .await
        .unwrap();

    let query = embedder.embed("what is my name").await.unwrap();
    let results = store.search("u1", &query, 10).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results
        .iter()
        .all(|m| m.user_id == "u1" && m.attributes.status == MemoryStatus::Active));
    // result vectors are omitted
    assert!(results.iter().all(|m| m.vector.is_none()));
}

#[tokio::test]
async fn delete_all_empties_the_user_and_only_the_user() {
    // Invariant 4.
    let store = MemoryVectorStore::new();
    let embedder = HashEmbedder::new();

    store
        .insert(&record(&embedder, "a1", "u1", "fact one").await)
        .await
        .unwrap();
    store
        .insert(&record(&embedder, "a2", "u1", "fact two").await)
        .await
        .unwrap();
    store
        .insert(&record(&embedder, "b1", "u2", "other user fact").await)
        .await
        .unwrap();

    store.delete_all("u1").await.unwrap();

    let query = embedder.embed("fact").await.unwrap();
    assert!(store.search("u1", &query, 10).await.unwrap().is_empty());
    assert!(store.get_by_user("u1", None).await.unwrap().is_empty());
    assert_eq!(store.get_by_user("u2", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_k_bounds_are_enforced() {
    let store = MemoryVectorStore::new();
    let query = vec![0.5_f32; 8];

    assert!(matches!(
        store.search("u1", &query, 0).await.unwrap_err(),
        EngramError::Validation(_)
    ));
    assert!(matches!(
        store.search("u1", &query, 51).await.unwrap_err(),
        EngramError::Validation(_)
    ));
    assert!(store.search("u1", &query, 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn identical_content_ranks_first() {
    let store = MemoryVectorStore::new();
    let embedder = HashEmbedder::new();

    store
        .insert(&record(&embedder, "m1", "u1", "Prefers Japanese cuisine").await)
        .await
        .unwrap();
    store
        .insert(&record(&embedder, "m2", "u1", "Works as a carpenter").await)
        .await
        .unwrap();
    store
        .insert(&record(&embedder, "m3", "u1", "Allergic to peanuts").await)
        .await
        .unwrap();

    let query = embedder.embed("Prefers Japanese cuisine").await.unwrap();
    let results = store.search("u1", &query, 3).await.unwrap();
    assert_eq!(results[0].id, "m1");
}
