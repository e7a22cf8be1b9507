//! Path extractors that answer with the JSON error envelope

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use shared::error::AppError;
use uuid::Uuid;

/// `{id}` path segment parsed as a UUID
///
/// A malformed id is rejected with `InvalidRequest` instead of axum's
/// plain-text 400.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for IdPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(IdPath(id)),
            Err(rejection) => {
                tracing::debug!(uri = %parts.uri, error = %rejection.body_text(), "Rejected path id");
                Err(AppError::invalid_request("Path id must be a UUID")
                    .with_detail("reason", rejection.body_text()))
            }
        }
    }
}
