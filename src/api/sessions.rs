// src/api/sessions.rs
// Session management endpoints. Every route is scoped by the path user_id;
// foreign sessions 404 exactly like missing ones.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiResult, IntoApiError};
use crate::api::request_id::RequestId;
use crate::session::{Message, Session};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<Session> for SessionSummary {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.session_id,
            user_id: s.user_id,
            title: s.title,
            message_count: s.message_count,
            created_at: s.created_at,
            last_activity: s.last_activity,
        }
    }
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub total_count: usize,
}

#[derive(Serialize)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for SessionMessage {
    fn from(m: Message) -> Self {
        Self {
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SessionDetailResponse {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<SessionMessage>,
}

#[derive(Deserialize)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub message: String,
}

/// GET /chat/{user_id}/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(rid): Extension<RequestId>,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state.sessions.list(&user_id).await.api_err(&rid)?;
    let sessions: Vec<SessionSummary> = sessions.into_iter().map(Into::into).collect();
    let total_count = sessions.len();

    Ok(Json(SessionListResponse {
        sessions,
        total_count,
    }))
}

/// GET /chat/{user_id}/sessions/{session_id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
    Extension(rid): Extension<RequestId>,
) -> ApiResult<Json<SessionDetailResponse>> {
    let session = state
        .sessions
        .get_owned(&session_id, &user_id)
        .await
        .api_err(&rid)?;
    let messages = state
        .sessions
        .all_messages(&session_id)
        .await
        .api_err(&rid)?;

    Ok(Json(SessionDetailResponse {
        session_id: session.session_id,
        user_id: session.user_id,
        title: session.title,
        summary: session.summary,
        message_count: session.message_count,
        created_at: session.created_at,
        last_activity: session.last_activity,
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

/// PUT /chat/{user_id}/sessions/{session_id}
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
    Extension(rid): Extension<RequestId>,
    Json(body): Json<UpdateSessionRequest>,
) -> ApiResult<Json<AckResponse>> {
    state
        .sessions
        .get_owned(&session_id, &user_id)
        .await
        .api_err(&rid)?;

    if let Some(title) = body.title {
        state
            .sessions
            .update_title(&session_id, &title)
            .await
            .api_err(&rid)?;
    }

    Ok(Json(AckResponse {
        message: "session updated".to_string(),
    }))
}

/// DELETE /chat/{user_id}/sessions/{session_id}
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
    Extension(rid): Extension<RequestId>,
) -> ApiResult<Json<AckResponse>> {
    state
        .sessions
        .get_owned(&session_id, &user_id)
        .await
        .api_err(&rid)?;
    state.sessions.delete(&session_id).await.api_err(&rid)?;

    info!(user_id = %user_id, session_id = %session_id, "session deleted");
    Ok(Json(AckResponse {
        message: "session deleted".to_string(),
    }))
}
