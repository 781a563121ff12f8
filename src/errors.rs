//! Errors for Rescue Radar
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RescueRadarError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Unauthorized")]
    AuthError,

    #[error("Reading not found for victim {0}")]
    NotFound(String),

    #[error("{0}")]
    FeatureUnavailableError(String),

    #[error("PDF generation failed: {0}")]
    RenderError(String),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Stored timestamp out of range: {0}")]
    InvalidTimestamp(i64),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl RescueRadarError {
    pub(crate) fn validation(message: &str) -> Self {
        Self::ValidationError(message.to_string())
    }
}
