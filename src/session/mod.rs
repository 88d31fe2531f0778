// src/session/mod.rs

pub mod store;
pub mod types;

pub use store::{derive_title, SessionStore, MAX_TITLE_CHARS};
pub use types::{Message, Session, SummaryRecord};
