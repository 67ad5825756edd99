//! Error types for termkeep-core

use thiserror::Error;

use crate::history::HistoryError;
use crate::pty::PtyError;
use crate::semaphore::SemaphoreError;

/// Top-level error type for termkeep-core
#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Failed to spawn terminal: {0}")]
    Spawn(#[source] PtyError),

    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Session {0} still running after SIGKILL")]
    StillRunning(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Spawn admission rejected: {0}")]
    Semaphore(#[from] SemaphoreError),
}
