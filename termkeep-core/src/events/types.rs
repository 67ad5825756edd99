//! Event type definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pty::{ExitStatus, Signal};

/// Notification about one terminal pane.
///
/// `instance_id` names the process that produced the event. A pane that is
/// respawned gets a new instance, so consumers can tell its events apart
/// from the previous process's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalEvent {
    /// A batch of (filtered) output
    Data {
        pane_id: String,
        instance_id: Uuid,
        data: String,
    },

    /// The pane's process exited. Emitted exactly once per process, after
    /// its final data batch.
    Exit {
        pane_id: String,
        instance_id: Uuid,
        exit_code: Option<u32>,
        signal: Option<Signal>,
    },
}

impl TerminalEvent {
    pub fn exit(pane_id: impl Into<String>, instance_id: Uuid, status: &ExitStatus) -> Self {
        Self::Exit {
            pane_id: pane_id.into(),
            instance_id,
            exit_code: status.exit_code,
            signal: status.signal,
        }
    }

    pub fn pane_id(&self) -> &str {
        match self {
            Self::Data { pane_id, .. } | Self::Exit { pane_id, .. } => pane_id,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        match self {
            Self::Data { instance_id, .. } | Self::Exit { instance_id, .. } => *instance_id,
        }
    }

    /// Channel name in the `data:<paneId>` / `exit:<paneId>` scheme used by
    /// transports that multiplex events by string key.
    pub fn channel(&self) -> String {
        match self {
            Self::Data { pane_id, .. } => format!("data:{pane_id}"),
            Self::Exit { pane_id, .. } => format!("exit:{pane_id}"),
        }
    }
}
