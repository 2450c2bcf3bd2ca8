use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Machine-readable scheduling conflict. `alternatives` is serialized as-is.
    #[error("Conflict ({code}): {message}")]
    Conflict {
        message: String,
        code: String,
        alternatives: Option<Value>,
    },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            AppError::Conflict { message, code, alternatives } => {
                tracing::warn!("Conflict: {}: {}", code, message);
                let mut payload = json!({
                    "error": message,
                    "code": code,
                });
                if let Some(alternatives) = alternatives {
                    payload["alternatives"] = alternatives;
                }
                payload
            }
            AppError::NotFound(msg)
            | AppError::Database(msg)
            | AppError::ValidationError(msg) => {
                tracing::error!("Error: {}: {}", status, msg);
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}
