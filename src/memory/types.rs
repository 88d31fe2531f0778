// src/memory/types.rs
// Memory record shapes and the wire types of the extraction and
// consolidation LLM calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Lifecycle state of a memory. `Outdated` records are retained for audit
/// but never injected into chat context; their content and vector are frozen
/// at the moment of tombstoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    Active,
    Outdated,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Outdated => "outdated",
        }
    }
}

/// The two attributes the engine ever reads. The type token is advisory:
/// `personal`, `preference`, `activity`, `plan`, `health`, `professional`,
/// `miscellaneous` are expected, but any short lowercase token passes
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAttributes {
    #[serde(rename = "type")]
    pub memory_type: String,
    pub status: MemoryStatus,
}

impl MemoryAttributes {
    pub fn active(memory_type: impl Into<String>) -> Self {
        Self {
            memory_type: memory_type.into(),
            status: MemoryStatus::Active,
        }
    }
}

/// A durable fact about one user. Memories are owned by `user_id`, never by
/// sessions; they outlive the sessions that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// Omitted from search results for bandwidth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    pub attributes: MemoryAttributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        user_id: impl Into<String>,
        content: impl Into<String>,
        attributes: MemoryAttributes,
        vector: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: content.into(),
            vector: Some(vector),
            attributes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.attributes.status == MemoryStatus::Active
    }
}

/// Partial update applied through `VectorStore::update`.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub vector: Option<Vec<f32>>,
    pub attributes: Option<MemoryAttributes>,
}

// ---------------------------------------------------------------------------
// Extraction wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub content: String,
    pub attributes: ExtractedAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAttributes {
    #[serde(rename = "type")]
    pub memory_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub memories: Vec<ExtractedFact>,
}

/// JSON schema handed to the structured completion for extraction.
pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "content": { "type": "string" },
                        "attributes": {
                            "type": "object",
                            "properties": {
                                "type": { "type": "string" }
                            },
                            "required": ["type"],
                            "additionalProperties": false
                        }
                    },
                    "required": ["content", "attributes"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["memories"],
        "additionalProperties": false
    })
}

// ---------------------------------------------------------------------------
// Consolidation wire types

/// One memory as exchanged with the consolidation call, in either the
/// EXISTING or the NEW list and in the returned plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationItem {
    pub id: String,
    pub content: String,
    pub attributes: MemoryAttributes,
}

impl ConsolidationItem {
    pub fn from_record(record: &MemoryRecord) -> Self {
        Self {
            id: record.id.clone(),
            content: record.content.clone(),
            attributes: record.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationResponse {
    pub memories: Vec<ConsolidationItem>,
}

pub fn consolidation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "content": { "type": "string" },
                        "attributes": {
                            "type": "object",
                            "properties": {
                                "type": { "type": "string" },
                                "status": { "type": "string", "enum": ["active", "outdated"] }
                            },
                            "required": ["type", "status"],
                            "additionalProperties": false
                        }
                    },
                    "required": ["id", "content", "attributes"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["memories"],
        "additionalProperties": false
    })
}

// ---------------------------------------------------------------------------
// Topic detection wire type

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicChangedResponse {
    pub topic_changed: bool,
}

pub fn topic_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic_changed": { "type": "boolean" }
        },
        "required": ["topic_changed"],
        "additionalProperties": false
    })
}
