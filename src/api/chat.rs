// src/api/chat.rs
// Chat endpoints: JSON by default, SSE when the client asks for
// text/event-stream.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::api::error::{ApiResult, IntoApiError};
use crate::api::request_id::RequestId;
use crate::chat::StreamEvent;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub memories_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}

fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::SessionCreated { session_id } => Event::default()
            .event("session_created")
            .data(json!({ "session_id": session_id }).to_string()),
        StreamEvent::Content { delta } => Event::default()
            .event("content")
            .data(json!({ "delta": delta }).to_string()),
        StreamEvent::Complete {
            session_id,
            memories_used,
            timestamp,
        } => Event::default().event("complete").data(
            json!({
                "session_id": session_id,
                "memories_used": memories_used,
                "timestamp": timestamp,
            })
            .to_string(),
        ),
        StreamEvent::Error { message } => Event::default()
            .event("error")
            .data(json!({ "message": message }).to_string()),
    }
}

async fn run_chat(
    state: Arc<AppState>,
    rid: RequestId,
    headers: HeaderMap,
    user_id: String,
    session_id: Option<String>,
    message: String,
) -> ApiResult<Response> {
    let request_ts = Utc::now();

    if wants_event_stream(&headers) {
        info!(user_id = %user_id, "streaming chat request");
        let rx = state
            .chat
            .chat_stream(&user_id, &message, request_ts, session_id.as_deref())
            .await
            .api_err(&rid)?;

        let stream = ReceiverStream::new(rx)
            .map(|event| Ok::<Event, Infallible>(to_sse_event(event)));

        return Ok(Sse::new(stream)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    info!(user_id = %user_id, "chat request");
    let outcome = state
        .chat
        .chat(&user_id, &message, request_ts, session_id.as_deref())
        .await
        .api_err(&rid)?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        session_id: outcome.session_id,
        memories_used: outcome.memories_used,
        timestamp: outcome.timestamp,
    })
    .into_response())
}

/// POST /chat/{user_id}/new - create a session and send the first message.
pub async fn chat_new(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Response> {
    run_chat(state, rid, headers, user_id, None, body.message).await
}

/// POST /chat/{user_id}/{session_id} - continue an existing session.
pub async fn chat_continue(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Response> {
    run_chat(state, rid, headers, user_id, Some(session_id), body.message).await
}
