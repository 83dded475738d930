use reqwest::StatusCode;
use thiserror::Error;

/// A request that was rejected before anything went over the wire.
///
/// The `Display` text is what the user sees in the status banner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a message or select a file")]
    EmptySend,

    #[error("Please enter a CSV URL")]
    EmptyUrl,

    #[error("Please enter a valid URL")]
    InvalidUrl,

    #[error("Unsupported file type")]
    UnsupportedFile,

    #[error("Image size must be less than 10MB")]
    ImageTooLarge,

    #[error("CSV file size must be less than 5MB")]
    CsvTooLarge,

    #[error("A request is already in progress")]
    Busy,

    #[error("Could not read file: {0}")]
    Unreadable(String),
}

/// Failures talking to the chat backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Non-success HTTP status; `message` carries the server's `error` field when present.
    #[error("HTTP error! status: {status}{}", .message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    Http {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to read attachment: {0}")]
    Io(#[from] std::io::Error),

    /// The task running the request panicked or was aborted.
    #[error("Request task failed: {0}")]
    TaskFailed(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::Http { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }

    pub fn is_network(&self) -> bool {
        match self {
            BackendError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// Failures of the on-disk key/value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
