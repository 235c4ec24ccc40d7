use std::io;

/// Custom error type for gitlab_trigger_relay operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Environment variable {0} is required")]
    MissingVariable(String),

    #[error("Invalid value for {name}: {message}")]
    InvalidVariable { name: String, message: String },

    #[error("Logging setup failed: {0}")]
    LoggingError(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
