//! Request, result and snapshot types for the session registry

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pty::Signal;

/// Parameters for [`SessionRegistry::create_or_attach`](super::SessionRegistry::create_or_attach)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOrAttachRequest {
    pub pane_id: String,
    pub tab_id: String,
    pub workspace_id: String,
    /// Working directory for a fresh spawn; falls back to configuration
    pub cwd: Option<PathBuf>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    /// Written to the shell, newline-terminated, right after a fresh spawn
    pub initial_commands: Vec<String>,
    /// Spawn-gate priority, lower is served first
    pub priority: i32,
    /// Shell override for a fresh spawn
    pub shell: Option<PathBuf>,
}

impl CreateOrAttachRequest {
    pub fn new(
        pane_id: impl Into<String>,
        tab_id: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            pane_id: pane_id.into(),
            tab_id: tab_id.into(),
            workspace_id: workspace_id.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = Some(cols);
        self.rows = Some(rows);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_initial_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

/// Outcome of create-or-attach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrAttachResult {
    /// A new process was spawned
    pub is_new: bool,
    /// Text to replay into the terminal view
    pub scrollback: String,
    /// `scrollback` came from a previous session's history
    pub was_recovered: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillOptions {
    pub delete_history: bool,
}

impl KillOptions {
    pub fn delete_history() -> Self {
        Self {
            delete_history: true,
        }
    }
}

/// Result of killing every session of a workspace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSummary {
    pub killed: usize,
    pub failed: usize,
}

/// Point-in-time view of one registered session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub pane_id: String,
    pub tab_id: String,
    pub workspace_id: String,
    /// Distinguishes successive processes spawned for the same pane
    pub instance_id: Uuid,
    pub pid: Option<u32>,
    pub cwd: Option<PathBuf>,
    pub shell: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub is_alive: bool,
    pub attached: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub exit_code: Option<u32>,
    pub exit_signal: Option<Signal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let request = CreateOrAttachRequest::new("pane", "tab", "ws")
            .with_size(120, 40)
            .with_cwd("/tmp")
            .with_initial_commands(["cd src", "ls"])
            .with_priority(-1);

        assert_eq!(request.pane_id, "pane");
        assert_eq!((request.cols, request.rows), (Some(120), Some(40)));
        assert_eq!(request.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(request.initial_commands, vec!["cd src", "ls"]);
        assert_eq!(request.priority, -1);
        assert!(request.shell.is_none());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: CreateOrAttachRequest =
            serde_json::from_str(r#"{"pane_id":"p","tab_id":"t","workspace_id":"w"}"#).unwrap();
        assert_eq!(request, CreateOrAttachRequest::new("p", "t", "w"));
    }

    #[test]
    fn kill_options_default_preserves_history() {
        assert!(!KillOptions::default().delete_history);
        assert!(KillOptions::delete_history().delete_history);
    }
}
