//! API error mapping
//!
//! Maps the domain error taxonomy onto HTTP status codes. Not-found and
//! configuration-fatal conditions surface as explicit failures with
//! actionable messages; tolerated inputs never reach this type because the
//! core absorbs them before an error can exist.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use readlab_common::Error;
use serde_json::json;

/// HTTP-facing error wrapper
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
