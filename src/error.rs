//! Error taxonomy for survey operations.
//!
//! Validation and not-found errors are the caller's fault and map to 4xx.
//! Upstream and persistence errors map to 5xx.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed request body: missing or wrong-typed field.
    #[error("{0}")]
    Validation(String),

    /// Unknown survey id or blob key.
    #[error("{0} not found")]
    NotFound(String),

    /// Blob storage or classification API failed or timed out.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Local durable state could not be written.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
