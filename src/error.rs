//! Error types for ClassCraft client operations

use serde::Serialize;

/// Result type for ClassCraft client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error types for ClassCraft client operations
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// Every error that reaches a submit flow is surfaced as a request failure.
    /// Input problems are caught before a request is built.
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::InvalidInput(_) => FailureKind::InvalidInput,
            _ => FailureKind::RequestFailed,
        }
    }
}

/// User-facing failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Missing file or unusable class count, caught before any network call
    InvalidInput,
    /// HTTP success without a `download_url` field
    MissingDownloadLink,
    /// Network failure, non-success status or unreadable body
    RequestFailed,
}

impl FailureKind {
    /// Process exit status reported by the CLI for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            FailureKind::RequestFailed => 1,
            FailureKind::InvalidInput => 2,
            FailureKind::MissingDownloadLink => 3,
        }
    }
}
