//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error returned by a request handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be parsed.
    #[error("Invalid JSON body")]
    BadRequest(#[from] serde_json::Error),
    /// A server-side failure (e.g. the subscription file could not be written).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Wrap an internal failure, logging the full context chain.
    pub fn internal(err: &anyhow::Error) -> Self {
        log::error!("Request failed: {err:#}");
        Self::Internal(err.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
