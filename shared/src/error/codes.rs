//! Unified error codes for the label pipeline
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Label errors
//! - 5xxx: Print job errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 values on the wire so API clients can switch on them
/// without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Caller identity could not be parsed
    InvalidUserIdentity = 1002,

    // ==================== 4xxx: Label ====================
    /// Label record not found
    LabelNotFound = 4001,
    /// Submitted batch contains no labels
    LabelBatchEmpty = 4003,
    /// Label could not be rendered into a document
    LabelRenderFailed = 4004,

    // ==================== 5xxx: Print Job ====================
    /// Print job not found
    PrintJobNotFound = 5001,
    /// Transition not allowed from the job's current status
    PrintJobInvalidTransition = 5002,
    /// Job has used up its retry budget
    PrintJobRetryExhausted = 5003,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidUserIdentity => "User identity is invalid",

            // Label
            ErrorCode::LabelNotFound => "Label not found",
            ErrorCode::LabelBatchEmpty => "Label batch is empty",
            ErrorCode::LabelRenderFailed => "Label could not be rendered",

            // Print job
            ErrorCode::PrintJobNotFound => "Print job not found",
            ErrorCode::PrintJobInvalidTransition => "Print job cannot transition from its current status",
            ErrorCode::PrintJobRetryExhausted => "Print job has no retries left",

            // System
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidUserIdentity),

            // Label
            4001 => Ok(ErrorCode::LabelNotFound),
            4003 => Ok(ErrorCode::LabelBatchEmpty),
            4004 => Ok(ErrorCode::LabelRenderFailed),

            // Print job
            5001 => Ok(ErrorCode::PrintJobNotFound),
            5002 => Ok(ErrorCode::PrintJobInvalidTransition),
            5003 => Ok(ErrorCode::PrintJobRetryExhausted),

            // System
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::InvalidRequest.code(), 5);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::LabelNotFound.code(), 4001);
        assert_eq!(ErrorCode::LabelBatchEmpty.code(), 4003);
        assert_eq!(ErrorCode::PrintJobNotFound.code(), 5001);
        assert_eq!(ErrorCode::PrintJobRetryExhausted.code(), 5003);
        assert_eq!(ErrorCode::DatabaseError.code(), 9002);
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(0), Ok(ErrorCode::Success));
        assert_eq!(ErrorCode::try_from(4004), Ok(ErrorCode::LabelRenderFailed));
        assert_eq!(
            ErrorCode::try_from(5002),
            Ok(ErrorCode::PrintJobInvalidTransition)
        );
        assert_eq!(ErrorCode::try_from(9002), Ok(ErrorCode::DatabaseError));
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4002), Err(InvalidErrorCode(4002)));
        assert_eq!(ErrorCode::try_from(6001), Err(InvalidErrorCode(6001)));
        assert_eq!(ErrorCode::try_from(10000), Err(InvalidErrorCode(10000)));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ErrorCode::PrintJobRetryExhausted).unwrap();
        assert_eq!(json, "5003");

        let json = serde_json::to_string(&ErrorCode::Success).unwrap();
        assert_eq!(json, "0");
    }

    #[test]
    fn test_deserialize() {
        let code: ErrorCode = serde_json::from_str("4001").unwrap();
        assert_eq!(code, ErrorCode::LabelNotFound);

        let result: Result<ErrorCode, _> = serde_json::from_str("4999");
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::InvalidRequest), "5");
        assert_eq!(format!("{}", ErrorCode::PrintJobNotFound), "5001");
        assert_eq!(
            format!("{}", InvalidErrorCode(999)),
            "invalid error code: 999"
        );
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::LabelNotFound.message(), "Label not found");
        assert_eq!(
            ErrorCode::PrintJobRetryExhausted.message(),
            "Print job has no retries left"
        );
        assert_eq!(ErrorCode::DatabaseError.message(), "Database error");
    }
}
