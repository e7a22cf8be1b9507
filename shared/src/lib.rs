//! Shared types for the label pipeline
//!
//! Domain models exchanged between the server crate and API clients,
//! plus the unified error codes and response envelope.

pub mod error;
pub mod models;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
