//! Identity Extractor

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::{AppError, ErrorCode};
use uuid::Uuid;

use crate::auth::{CurrentUser, USER_ID_HEADER};
use crate::core::ServerState;
use crate::security_log;

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(*user);
        }

        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            security_log!(WARN, "identity_missing", uri = %parts.uri);
            return Err(AppError::not_authenticated());
        };

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| {
                security_log!(WARN, "identity_invalid", uri = %parts.uri);
                AppError::with_message(
                    ErrorCode::InvalidUserIdentity,
                    format!("{} must be a UUID", USER_ID_HEADER),
                )
            })?;

        let user = CurrentUser { user_id };
        parts.extensions.insert(user);
        Ok(user)
    }
}
