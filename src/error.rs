use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or incomplete request (caller-fixable)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Category label never seen when the codec was fitted
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// Category index outside `0..K`
    #[error("Index {index} out of range for {len} categories")]
    IndexOutOfRange { index: usize, len: usize },

    /// Component used before `fit`
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Every candidate classifier failed to fit
    #[error("No model trained: {0}")]
    NoModelTrained(String),

    /// A single classifier fit failed
    #[error("Training error: {0}")]
    Training(String),

    /// Missing or corrupt persisted artifact
    #[error("Failed to load artifact {path}: {message}")]
    ArtifactLoad { path: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV corpus errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownLabel(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IndexOutOfRange { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFitted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NoModelTrained(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ArtifactLoad { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnknownLabel(_) => "UNKNOWN_LABEL",
            AppError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            AppError::NotFitted(_) => "NOT_FITTED",
            AppError::NoModelTrained(_) => "NO_MODEL_TRAINED",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::ArtifactLoad { .. } => "ARTIFACT_LOAD_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Shorthand for artifact failures
    pub fn artifact(path: impl AsRef<std::path::Path>, message: impl std::fmt::Display) -> Self {
        AppError::ArtifactLoad {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_client_error() {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        } else {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
