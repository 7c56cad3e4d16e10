//! Request-level error taxonomy.
//!
//! Every failure a handler can surface maps to exactly one variant and one
//! HTTP status, and renders as the standard response envelope. Messages are
//! built from component errors that never embed credentials or API keys;
//! upstream response bodies are truncated before they get here.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::web::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed (blank question, undecodable body).
    #[error("{0}")]
    Validation(String),

    /// Generated SQL failed the execution guard and was never run. Carries
    /// the rejected statement so operators can see what was blocked.
    #[error("unsafe SQL rejected: {reason}")]
    UnsafeQuery { sql: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    /// The live schema could not be read from the database.
    #[error("database schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// Statement execution exceeded the configured time ceiling.
    #[error("query timed out after {0} ms")]
    QueryTimeout(u64),

    /// No generation backend or required collaborator is reachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnsafeQuery { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SchemaUnavailable(_) | Self::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::QueryTimeout(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // Guard rejections expose the blocked statement for visibility.
            Self::UnsafeQuery { sql, reason } => ApiResponse::failure_with_data(
                json!({ "sql": sql, "reason": reason }),
                self.to_string(),
            ),
            _ => ApiResponse::failure(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
