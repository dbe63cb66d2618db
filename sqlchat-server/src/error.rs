//! Request-level errors and their JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use sqlchat_ai::GenerationError;
use sqlchat_connectors::QueryExecutionError;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller sent no usable value for a required body field.
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    QueryExecution(#[from] QueryExecutionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ApiError::MissingField(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Generation(e) => {
                error!(error = %e, "SQL generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
            ApiError::QueryExecution(e) => {
                error!(error = %e, "query execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": message })),
                )
                    .into_response()
            }
        }
    }
}
