//! Caller identity
//!
//! Authentication happens upstream. Requests arrive with the already
//! authenticated user's id in the `X-User-Id` header and the
//! [`CurrentUser`] extractor turns it into a typed identity.

pub mod extractor;

use uuid::Uuid;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
}
