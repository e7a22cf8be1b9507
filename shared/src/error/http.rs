//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::LabelNotFound | Self::PrintJobNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::PrintJobInvalidTransition | Self::PrintJobRetryExhausted => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::InvalidUserIdentity => StatusCode::UNAUTHORIZED,

            // 422 Unprocessable (payload parsed but cannot be rendered)
            Self::LabelRenderFailed => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request
            Self::InvalidRequest | Self::LabelBatchEmpty => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            ErrorCode::LabelNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::PrintJobNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(
            ErrorCode::PrintJobRetryExhausted.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::PrintJobInvalidTransition.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            ErrorCode::NotAuthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::InvalidUserIdentity.http_status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::InvalidRequest.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::LabelBatchEmpty.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_server_side_status() {
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::LabelRenderFailed.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
