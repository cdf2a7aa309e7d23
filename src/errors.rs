use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: cannot {operation} while {status}")]
    InvalidTransition { status: String, operation: String },

    #[error("slot unavailable")]
    SlotUnavailable,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::SlotUnavailable => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
        };

        let kind = match &self {
            AppError::Database(_) | AppError::Internal(_) => "internal",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::SlotUnavailable => "slot_unavailable",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized => "unauthorized",
        };

        let body = serde_json::json!({ "error": self.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}
