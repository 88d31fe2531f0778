// src/api/error.rs
// HTTP error responses. Every non-2xx body carries the request id that the
// middleware also places in the X-Request-ID header.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::api::request_id::RequestId;
use crate::error::EngramError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: String,
    pub message: String,
    pub details: Option<Value>,
    pub request_id: String,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error_code: impl Into<String>,
        message: impl Into<String>,
        request_id: &RequestId,
    ) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
            details: None,
            request_id: request_id.0.clone(),
        }
    }

    pub fn from_engram(err: EngramError, request_id: &RequestId) -> Self {
        let (status, error_code) = match &err {
            EngramError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            EngramError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngramError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            EngramError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE"),
            EngramError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            EngramError::LlmParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_ERROR"),
            EngramError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
        };
        Self::new(status, error_code, err.to_string(), request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error_code": self.error_code,
            "message": self.message,
            "timestamp": Utc::now().to_rfc3339(),
            "request_id": self.request_id,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Extension trait so handlers can lift core errors with their request id.
pub trait IntoApiError<T> {
    fn api_err(self, request_id: &RequestId) -> ApiResult<T>;
}

impl<T> IntoApiError<T> for Result<T, EngramError> {
    fn api_err(self, request_id: &RequestId) -> ApiResult<T> {
        self.map_err(|e| ApiError::from_engram(e, request_id))
    }
}
