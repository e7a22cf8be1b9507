//! Data models
//!
//! Shared between label-server and API clients. All ids are UUIDs.

pub mod batch;
pub mod label;
pub mod print_job;

// Re-exports
pub use batch::*;
pub use label::*;
pub use print_job::*;
