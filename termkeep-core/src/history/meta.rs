//! Per-pane session metadata stored next to the scrollback

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of `meta.json`: what the most recent session for a pane looked
/// like and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMeta {
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub shell: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<u32>,
}

impl HistoryMeta {
    /// Metadata for a session starting now.
    pub fn started(shell: impl Into<PathBuf>, cwd: Option<PathBuf>, cols: u16, rows: u16) -> Self {
        Self {
            cwd,
            cols,
            rows,
            shell: shell.into(),
            started_at: Utc::now(),
            ended_at: None,
            exit_code: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}
