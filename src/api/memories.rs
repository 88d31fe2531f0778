// src/api/memories.rs
// User memory endpoints: list and purge.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiResult, IntoApiError};
use crate::api::request_id::RequestId;
use crate::api::sessions::AckResponse;
use crate::memory::MemoryRecord;
use crate::state::AppState;

#[derive(Serialize)]
pub struct MemoryListResponse {
    pub memories: Vec<MemoryRecord>,
}

/// GET /chat/{user_id}/memories
pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(rid): Extension<RequestId>,
) -> ApiResult<Json<MemoryListResponse>> {
    let memories = state
        .memories
        .get_by_user(&user_id, None)
        .await
        .api_err(&rid)?;

    Ok(Json(MemoryListResponse { memories }))
}

/// DELETE /chat/{user_id}/memories
pub async fn delete_memories(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(rid): Extension<RequestId>,
) -> ApiResult<Json<AckResponse>> {
    state.memories.delete_all(&user_id).await.api_err(&rid)?;

    info!(user_id = %user_id, "memories deleted");
    Ok(Json(AckResponse {
        message: format!("memories deleted for user {}", user_id),
    }))
}
