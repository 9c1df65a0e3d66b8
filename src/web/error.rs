use crate::core::assistant::ResultEnvelope;
use crate::core::sessions::SessionBusy;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Request-level failures. The body is always a failure envelope so clients
/// parse one shape.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or malformed input.
    BadRequest(String),
    /// 409 - another request holds the session.
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        (status, Json(ResultEnvelope::failure(message))).into_response()
    }
}

impl From<SessionBusy> for ApiError {
    fn from(err: SessionBusy) -> Self {
        ApiError::Conflict(format!("{}. Please wait for it to finish.", err))
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", err.body_text()))
    }
}
