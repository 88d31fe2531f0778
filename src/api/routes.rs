// src/api/routes.rs
// Router composition for the fixed public surface.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::chat::{chat_continue, chat_new};
use crate::api::health::health;
use crate::api::memories::{delete_memories, list_memories};
use crate::api::request_id::request_id_middleware;
use crate::api::sessions::{delete_session, get_session, list_sessions, update_session};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat/{user_id}/new", post(chat_new))
        .route("/chat/{user_id}/sessions", get(list_sessions))
        .route(
            "/chat/{user_id}/sessions/{session_id}",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route(
            "/chat/{user_id}/memories",
            get(list_memories).delete(delete_memories),
        )
        .route("/chat/{user_id}/{session_id}", post(chat_continue))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
