// src/memory/mod.rs
// The memory write path (extract -> consolidate -> store) and read path
// (retrieve).

pub mod consolidator;
pub mod extractor;
pub mod retriever;
pub mod store;
pub mod types;

pub use consolidator::Consolidator;
pub use extractor::FactExtractor;
pub use retriever::Retriever;
pub use store::{QdrantMemoryStore, VectorStore};
pub use types::{MemoryAttributes, MemoryPatch, MemoryRecord, MemoryStatus};
