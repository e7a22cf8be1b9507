//! Utilities: logging setup and the audit/security log macros

pub mod logger;

pub use logger::{LogGuard, init_logger};
