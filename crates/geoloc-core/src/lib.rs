//! geoloc core - shared error types and configuration
//!
//! This crate defines the abstractions used throughout the geoloc workspace:
//! - The error taxonomy returned by every extraction path
//! - Configuration management (server, model artifacts, logging)

pub mod config;

pub use config::{AppConfig, ConfigError, LoggingConfig, ModelConfig, ServerConfig};

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for geoloc operations
#[derive(Error, Debug)]
pub enum GeolocError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Architecture mismatch: {0}")]
    ArchitectureMismatch(String),

    #[error("Artifact error at {path}: {message}")]
    Artifact { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GeolocError>;

/// Coarse classification of a [`GeolocError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backing model, mappings or tokenizer are not loaded
    Unavailable,
    /// The caller sent text that cannot be processed
    MalformedInput,
    /// Something failed while running a loaded model
    InferenceFailure,
    /// A model could not be loaded at startup
    LoadFailure,
    /// Anything else
    Internal,
}

impl GeolocError {
    /// Build an artifact error for a path
    pub fn artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelUnavailable(_) => ErrorKind::Unavailable,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::InferenceFailure(_) => ErrorKind::InferenceFailure,
            Self::ArchitectureMismatch(_) | Self::Artifact { .. } => ErrorKind::LoadFailure,
            Self::Config(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<ConfigError> for GeolocError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            GeolocError::ModelUnavailable("bilstm".into()).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            GeolocError::MalformedInput("empty".into()).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            GeolocError::InferenceFailure("nan".into()).kind(),
            ErrorKind::InferenceFailure
        );
        assert_eq!(
            GeolocError::artifact("weights.safetensors", "missing").kind(),
            ErrorKind::LoadFailure
        );
        assert_eq!(
            GeolocError::Other(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_artifact_error_display() {
        let err = GeolocError::artifact("data/BILSTM/ner_word2idx.json", "not found");
        assert_eq!(
            err.to_string(),
            "Artifact error at data/BILSTM/ner_word2idx.json: not found"
        );
    }
}
