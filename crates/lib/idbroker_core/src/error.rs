//! Broker error taxonomy.
//!
//! Every operation of the broker fails with an [`IdentityError`]. Collaborator
//! errors ([`DirectoryError`], [`OAuthError`]) convert into it at the boundary,
//! keeping their message.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::oauth::OAuthError;

/// Convenience alias for broker results.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors surfaced by the identity broker.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No identity for the given email, token or id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The email or federated login already belongs to a different identity.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Password or reset mismatch, missing or expired refresh token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The directory, an OAuth provider or the mail transport failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Malformed request, e.g. neither password nor reset supplied.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A local failure, such as password hashing.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`IdentityError`], serialized into error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    UpstreamFailure,
    ValidationFailure,
    Internal,
}

/// Structured `{kind, detail}` form of an error. The broker never renders
/// user-facing text; callers turn this into a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub detail: String,
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::NotFound(_) => ErrorKind::NotFound,
            IdentityError::Conflict(_) => ErrorKind::Conflict,
            IdentityError::Unauthorized(_) => ErrorKind::Unauthorized,
            IdentityError::Upstream(_) => ErrorKind::UpstreamFailure,
            IdentityError::Validation(_) => ErrorKind::ValidationFailure,
            IdentityError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Detail message without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            IdentityError::NotFound(m)
            | IdentityError::Conflict(m)
            | IdentityError::Unauthorized(m)
            | IdentityError::Upstream(m)
            | IdentityError::Validation(m)
            | IdentityError::Internal(m) => m,
        }
    }

    /// HTTP status a front controller should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
            IdentityError::Conflict(_) => StatusCode::CONFLICT,
            IdentityError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            IdentityError::Upstream(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Validation(_) => StatusCode::BAD_REQUEST,
            IdentityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            detail: self.detail().to_string(),
        }
    }
}

impl From<DirectoryError> for IdentityError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound(m) => IdentityError::NotFound(m),
            DirectoryError::NotAuthorized(m) => IdentityError::Unauthorized(m),
            DirectoryError::Conflict(m) => IdentityError::Conflict(m),
            DirectoryError::Upstream(m) => IdentityError::Upstream(m),
        }
    }
}

impl From<OAuthError> for IdentityError {
    fn from(e: OAuthError) -> Self {
        IdentityError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_maps_to_a_distinct_status() {
        let errors = [
            IdentityError::NotFound("a".into()),
            IdentityError::Conflict("b".into()),
            IdentityError::Unauthorized("c".into()),
            IdentityError::Upstream("d".into()),
            IdentityError::Validation("e".into()),
            IdentityError::Internal("f".into()),
        ];
        let mut statuses: Vec<u16> = errors.iter().map(|e| e.status().as_u16()).collect();
        statuses.sort_unstable();
        statuses.dedup();
        assert_eq!(statuses, vec![400, 401, 404, 409, 500, 502]);
    }

    #[test]
    fn directory_errors_keep_their_message() {
        let err: IdentityError = DirectoryError::NotAuthorized("Invalid login token.".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.detail(), "Invalid login token.");
    }

    #[test]
    fn body_serializes_kind_in_snake_case() {
        let body = IdentityError::Validation("neither password nor reset".into()).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "validation_failure");
        assert_eq!(json["detail"], "neither password nor reset");
    }
}
