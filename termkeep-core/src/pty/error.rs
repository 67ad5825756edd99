//! PTY error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Failed to resize PTY: {0}")]
    ResizeFailed(String),

    #[error("Failed to deliver {signal} to process: {reason}")]
    SignalFailed { signal: String, reason: String },

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("PTY I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
