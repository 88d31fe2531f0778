// src/api/mod.rs
// HTTP surface: routing, handlers, request ids and the error shape.

pub mod chat;
pub mod error;
pub mod health;
pub mod memories;
pub mod request_id;
pub mod routes;
pub mod sessions;

pub use error::{ApiError, ApiResult};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use routes::router;
