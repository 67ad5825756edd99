//! Local versus daemon-hosted sessions
//!
//! Sessions are either hosted in-process by a [`SessionRegistry`] or by a
//! background daemon that outlives the host application. Callers that act on
//! whole workspaces go through [`WorkspaceSessions`] and never branch on the
//! mode; [`select_workspace_sessions`] picks the implementation once from
//! configuration.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TerminalConfig;
use crate::semaphore::{PrioritySemaphore, SemaphoreError};
use crate::session::{KillOptions, KillSummary, SessionInfo, SessionRegistry};

/// Concurrent daemon requests when no spawn bound is configured
pub const DEFAULT_DAEMON_CONCURRENCY: usize = 4;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Daemon is not running")]
    NotRunning,

    #[error("Daemon request failed: {0}")]
    Request(String),

    #[error("Daemon request rejected: {0}")]
    Admission(#[from] SemaphoreError),
}

/// Client side of the session daemon
#[async_trait]
pub trait DaemonClient: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, DaemonError>;

    async fn kill(&self, pane_id: &str, options: KillOptions) -> Result<(), DaemonError>;

    async fn force_kill_all(&self) -> Result<(), DaemonError>;

    /// Stop the daemon if one is running. Returns whether one was.
    async fn shutdown_if_running(&self, kill_sessions: bool) -> Result<bool, DaemonError>;
}

/// Workspace-wide operations, independent of where sessions live
#[async_trait]
pub trait WorkspaceSessions: Send + Sync {
    /// Kill every session of the workspace and delete their history.
    async fn kill_by_workspace_id(&self, workspace_id: &str) -> KillSummary;

    /// Live sessions in the workspace.
    async fn session_count_by_workspace_id(&self, workspace_id: &str) -> usize;

    /// Host application is quitting.
    async fn shutdown(&self);
}

#[async_trait]
impl WorkspaceSessions for SessionRegistry {
    async fn kill_by_workspace_id(&self, workspace_id: &str) -> KillSummary {
        SessionRegistry::kill_by_workspace_id(self, workspace_id).await
    }

    async fn session_count_by_workspace_id(&self, workspace_id: &str) -> usize {
        self.get_session_count_by_workspace_id(workspace_id)
    }

    async fn shutdown(&self) {
        self.cleanup().await;
    }
}

/// Sessions hosted by the daemon. Requests are bounded by a priority gate.
pub struct DaemonSessions {
    client: Arc<dyn DaemonClient>,
    gate: PrioritySemaphore,
}

impl DaemonSessions {
    pub fn new(client: Arc<dyn DaemonClient>, max_concurrent: usize) -> Self {
        Self {
            client,
            gate: PrioritySemaphore::new(max_concurrent),
        }
    }

    pub fn gate(&self) -> &PrioritySemaphore {
        &self.gate
    }

    /// The daemon restarted: nothing in flight will complete, so release
    /// everyone waiting on the gate.
    pub fn handle_daemon_restart(&self) {
        tracing::warn!(
            pending = self.gate.pending(),
            in_use = self.gate.in_use(),
            "Session daemon restarted, resetting request gate"
        );
        self.gate.reset();
    }

    /// Stop the daemon, optionally killing its sessions first.
    pub async fn stop_daemon(&self, kill_sessions: bool) -> Result<bool, DaemonError> {
        self.client.shutdown_if_running(kill_sessions).await
    }

    /// Kill everything the daemon hosts.
    pub async fn force_kill_all(&self) -> Result<(), DaemonError> {
        let _permit = self.gate.acquire(0).await?;
        self.client.force_kill_all().await
    }

    async fn kill_one(&self, pane_id: &str) -> Result<(), DaemonError> {
        let _permit = self.gate.acquire(0).await?;
        self.client.kill(pane_id, KillOptions::delete_history()).await
    }
}

#[async_trait]
impl WorkspaceSessions for DaemonSessions {
    async fn kill_by_workspace_id(&self, workspace_id: &str) -> KillSummary {
        let sessions = match self.client.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(workspace_id = %workspace_id, error = %e, "Failed to list daemon sessions");
                return KillSummary::default();
            }
        };

        let mut summary = KillSummary::default();
        for session in sessions.iter().filter(|s| s.workspace_id == workspace_id) {
            match self.kill_one(&session.pane_id).await {
                Ok(()) => summary.killed += 1,
                Err(e) => {
                    tracing::warn!(pane_id = %session.pane_id, error = %e, "Failed to kill daemon session");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn session_count_by_workspace_id(&self, workspace_id: &str) -> usize {
        match self.client.list_sessions().await {
            Ok(sessions) => sessions
                .iter()
                .filter(|s| s.workspace_id == workspace_id && s.is_alive)
                .count(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list daemon sessions");
                0
            }
        }
    }

    async fn shutdown(&self) {
        // Daemon sessions outlive the host
        tracing::info!("Leaving daemon-hosted sessions running");
    }
}

/// Pick the session host once, from configuration.
///
/// Daemon mode without a client falls back to the local registry.
pub fn select_workspace_sessions(
    config: &TerminalConfig,
    registry: Arc<SessionRegistry>,
    daemon: Option<Arc<dyn DaemonClient>>,
) -> Arc<dyn WorkspaceSessions> {
    match (config.daemon_mode, daemon) {
        (true, Some(client)) => {
            let limit = config
                .max_concurrent_spawns
                .unwrap_or(DEFAULT_DAEMON_CONCURRENCY);
            tracing::info!(limit, "Using daemon-hosted terminal sessions");
            Arc::new(DaemonSessions::new(client, limit))
        }
        (true, None) => {
            tracing::warn!("Daemon mode configured but no daemon client available, using local sessions");
            registry
        }
        (false, _) => registry,
    }
}
