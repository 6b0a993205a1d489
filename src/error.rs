use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Gateway error type. Handlers return `Result<T, AppError>`.
/// Rendered as `{ "error": "...", "kind": "..." }` for the frontend.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Error pattern not recognized")]
    NotRecognized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Model error: {0}")]
    Model(#[from] crate::llm::ModelError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotRecognized => "not_recognized",
            AppError::Database(_) => "database",
            AppError::Model(_) => "model",
            AppError::Serde(_) => "serde",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotRecognized => StatusCode::NOT_FOUND,
            AppError::Model(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Serde(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "request rejected: {}", self);
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}
