use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Every failure path in the service surfaces as one of these. Nothing is
/// swallowed: handlers either succeed or return a member of this taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-range input. The client must fix and resend.
    #[error("{0}")]
    Validation(String),

    /// Username or email already registered. Expected, user-facing.
    #[error("username or email already in use")]
    DuplicatePrincipal,

    /// This identity already reacted to this whisper. Expected, user-facing.
    #[error("already reacted to this whisper")]
    AlreadyReacted,

    /// Unknown principal and wrong password are deliberately
    /// indistinguishable here.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The store timed out under contention. Safe to retry with backoff.
    #[error("store unavailable, retry later")]
    Unavailable,

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if auris_db::is_busy(&err) {
            ApiError::Unavailable
        } else {
            ApiError::Internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::DuplicatePrincipal | ApiError::AlreadyReacted => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Internal(err) => {
                error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (ApiError::Validation("bad tone".into()), StatusCode::BAD_REQUEST),
            (ApiError::DuplicatePrincipal, StatusCode::CONFLICT),
            (ApiError::AlreadyReacted, StatusCode::CONFLICT),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::NotFound("whisper"), StatusCode::NOT_FOUND),
            (ApiError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::Internal(anyhow::anyhow!("connection string leaked"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
