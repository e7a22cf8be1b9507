//! Core: configuration, shared state, background tasks and the HTTP server
//!
//! - [`Config`] - environment driven configuration
//! - [`ServerState`] - shared handles for handlers and workers
//! - [`BackgroundTasks`] - task registry with coordinated shutdown
//! - [`Server`] - HTTP server
//! - [`ServerError`] - startup errors

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::{Pipeline, ServerState};
pub use tasks::BackgroundTasks;
