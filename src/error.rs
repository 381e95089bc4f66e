use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// ApiError
///
/// The single error taxonomy surfaced by the request pipeline. Every variant
/// carries a stable, user-facing message; internal detail (storage errors,
/// codec failures) is logged at the point of failure and never leaked to the
/// caller. Gates and the criteria parser fail fast: the first error
/// short-circuits the rest of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Missing, malformed, expired or tampered token on a protected endpoint.
    Unauthenticated,
    /// Authenticated, but the role is not in the endpoint's allowed set.
    Forbidden,
    /// Malformed or whitelist-violating query/body input. The message names
    /// the offending value.
    Validation(String),
    NotFound(String),
    Conflict(String),
    /// Storage or codec failure not attributable to caller input.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "authentication required".to_string())
            }
            // Role denials respond with 406 Not Acceptable rather than 403.
            // Non-standard, but kept for wire compatibility with existing
            // clients of this API.
            ApiError::Forbidden => {
                (StatusCode::NOT_ACCEPTABLE, "do not have permission".to_string())
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    /// Storage failures propagate unchanged as an internal error: no retry,
    /// no partial result. The underlying cause goes to the log only.
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("storage error: {:?}", e);
        ApiError::Internal
    }
}
