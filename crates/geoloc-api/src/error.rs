//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geoloc_core::{ErrorKind, GeolocError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationErrors;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("MODEL_UNAVAILABLE", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Model, mappings or tokenizer not loaded
    Unavailable(String),
    /// Request rejected before reaching a model
    Validation(String),
    /// A loaded model failed on this input
    Inference(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, ApiError::unavailable(msg)),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, ApiError::validation(msg)),
            AppError::Inference(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INFERENCE_FAILED", "Error processing text").with_details(msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error().with_details(msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GeolocError> for AppError {
    fn from(err: GeolocError) -> Self {
        let kind = err.kind();
        let message = match err {
            GeolocError::ModelUnavailable(msg)
            | GeolocError::MalformedInput(msg)
            | GeolocError::InferenceFailure(msg) => msg,
            other => other.to_string(),
        };
        match kind {
            ErrorKind::Unavailable => AppError::Unavailable(message),
            ErrorKind::LoadFailure => AppError::Unavailable(format!("Model failed to load: {message}")),
            ErrorKind::MalformedInput => AppError::Validation(message),
            ErrorKind::InferenceFailure => AppError::Inference(message),
            ErrorKind::Internal => AppError::Internal(message),
        }
    }
}
