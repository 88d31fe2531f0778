// src/api/health.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health - session store and vector store status.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_healthy = state.sessions.health().await;
    let vector_healthy = state.memories.health().await;
    let healthy = database_healthy && vector_healthy;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "database": { "healthy": database_healthy },
            "vector_store": { "healthy": vector_healthy },
        })),
    )
}
