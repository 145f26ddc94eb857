//! HTTP-facing errors
//!
//! Clients only ever see a status code and a short generic message; the
//! underlying cause is logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::core::{StoreError, ValidationError};
use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no identity on request")]
    Unauthorized,

    #[error("prompt missing or blank")]
    PromptRequired,

    #[error("invalid chat record: {0}")]
    InvalidRecord(String),

    #[error("chat '{0}' not found")]
    ChatNotFound(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("storage failed: {0}")]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PromptRequired | AppError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            AppError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Generation(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Unauthorized",
            AppError::PromptRequired => "Prompt is required",
            AppError::InvalidRecord(_) => "Invalid chat record",
            AppError::ChatNotFound(_) => "Chat not found",
            AppError::Generation(_) => "Failed to generate response",
            AppError::Storage(_) => "Failed to access chat storage",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::PromptRequired => AppError::PromptRequired,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Generation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
