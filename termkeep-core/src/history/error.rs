//! History error types

use thiserror::Error;

/// Errors for scrollback history operations
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {kind} for history path: {value:?}")]
    InvalidPathComponent { kind: &'static str, value: String },

    #[error("Metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("History writer for {0} has stopped")]
    WriterClosed(String),
}
