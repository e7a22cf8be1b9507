//! Error types for the printer library

use thiserror::Error;

/// Delivery error types
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error while writing the document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer is offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for the printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The sink accepted the connection but refused the document
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    /// Whether resending the same document later may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::Rejected(_))
    }
}

/// Result type for delivery operations
pub type DeliveryResult<T> = Result<T, DeliveryError>;
