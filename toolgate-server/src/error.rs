//! Single adapter from core errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use toolgate::ToolgateError;

/// Error returned by route handlers and middleware. Every variant renders
/// as `{"error": "..."}` with a conventional status code.
#[derive(Debug)]
pub enum ApiError {
    /// A core error, mapped by taxonomy.
    Core(ToolgateError),
    /// A request the route layer rejected outright.
    BadRequest(String),
    /// A route that is not available in the current mode.
    Forbidden(String),
    /// An operation failure surfaced as a 500 with its cause.
    Internal(String),
}

impl From<ToolgateError> for ApiError {
    fn from(err: ToolgateError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(err) => (status_for(&err), err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn status_for(err: &ToolgateError) -> StatusCode {
    match err {
        ToolgateError::InvalidServerName { .. }
        | ToolgateError::InvalidToolName(_)
        | ToolgateError::InvalidMode(_)
        | ToolgateError::MissingField(_)
        | ToolgateError::Serialization(_) => StatusCode::BAD_REQUEST,
        ToolgateError::MissingToken | ToolgateError::UnknownToken | ToolgateError::WrongRole => {
            StatusCode::UNAUTHORIZED
        }
        ToolgateError::NotAllowed { .. } | ToolgateError::NotInitialized => StatusCode::FORBIDDEN,
        ToolgateError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolgateError::ModeMismatch { .. }
        | ToolgateError::UpstreamUnreachable { .. }
        | ToolgateError::Upstream { .. }
        | ToolgateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
