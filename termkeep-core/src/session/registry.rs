//! SessionRegistry: lifecycle of every terminal pane's PTY session
//!
//! The registry maps pane ids to sessions. At most one live session exists
//! per pane: concurrent create-or-attach calls for one pane are serialized
//! by a per-pane lock, so only the first spawns and the rest attach.
//!
//! Exited sessions stay registered for the configured retention window so
//! late queries still see them, and are reaped on the next create, kill or
//! cleanup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tokio::time::Instant;

use super::entry::{EntryParams, SessionEntry};
use super::pump::SessionPump;
use super::scrollback::ScrollbackBuffer;
use super::state::{
    CreateOrAttachRequest, CreateOrAttachResult, KillOptions, KillSummary, SessionInfo,
};
use crate::batcher::DataBatcher;
use crate::config::TerminalConfig;
use crate::error::TerminalError;
use crate::events::{Subscription, TerminalEventBus};
use crate::filter::OutputFilterChain;
use crate::history::{HistoryMeta, HistoryStore};
use crate::pty::{PtyBackend, PtyError, Signal, SpawnRequest, create_backend};
use crate::semaphore::PrioritySemaphore;

type PaneLock = Arc<tokio::sync::Mutex<()>>;

/// Owns every terminal session and exposes the lifecycle operations
pub struct SessionRegistry {
    config: TerminalConfig,
    backend: Arc<dyn PtyBackend>,
    history: HistoryStore,
    filters: Arc<OutputFilterChain>,
    events: Arc<TerminalEventBus>,
    spawn_gate: Option<PrioritySemaphore>,
    sessions: Mutex<HashMap<String, Arc<SessionEntry>>>,
    pane_locks: Mutex<HashMap<String, PaneLock>>,
}

impl SessionRegistry {
    /// Create a registry from its collaborators.
    pub fn new(
        config: TerminalConfig,
        backend: Arc<dyn PtyBackend>,
        history: HistoryStore,
        filters: Arc<OutputFilterChain>,
        events: Arc<TerminalEventBus>,
    ) -> Self {
        Self {
            config,
            backend,
            history,
            filters,
            events,
            spawn_gate: None,
            sessions: Mutex::new(HashMap::new()),
            pane_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry with everything derived from configuration: the
    /// backend, the history root and the spawn gate.
    pub fn from_config(config: TerminalConfig) -> Self {
        let backend = create_backend(&config);
        let history = HistoryStore::new(config.history_root());
        let spawn_gate = config.max_concurrent_spawns.map(PrioritySemaphore::new);
        let mut registry = Self::new(
            config,
            backend,
            history,
            Arc::new(OutputFilterChain::new()),
            Arc::new(TerminalEventBus::new()),
        );
        registry.spawn_gate = spawn_gate;
        registry
    }

    /// Gate fresh spawns through `gate`.
    pub fn with_spawn_gate(mut self, gate: PrioritySemaphore) -> Self {
        self.spawn_gate = Some(gate);
        self
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn filters(&self) -> &Arc<OutputFilterChain> {
        &self.filters
    }

    pub fn events(&self) -> &Arc<TerminalEventBus> {
        &self.events
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn spawn_gate(&self) -> Option<&PrioritySemaphore> {
        self.spawn_gate.as_ref()
    }

    /// Attach to the pane's live session, or spawn a new one.
    pub async fn create_or_attach(
        &self,
        request: CreateOrAttachRequest,
    ) -> Result<CreateOrAttachResult, TerminalError> {
        if request.tab_id.is_empty() {
            return Err(TerminalError::InvalidRequest("tab id is empty".into()));
        }
        self.history
            .pane_dir(&request.workspace_id, &request.pane_id)
            .map_err(|e| TerminalError::InvalidRequest(e.to_string()))?;

        let pane_lock = self.pane_lock(&request.pane_id);
        let _creating = pane_lock.lock().await;
        self.reap_expired();

        let existing = self.sessions().get(&request.pane_id).cloned();
        if let Some(entry) = existing {
            if entry.is_alive() {
                return Ok(self.attach(&entry, &request));
            }
            // Let the previous process finish writing its history first
            entry.wait_exited(self.config.kill_timeout()).await;
        }

        let _permit = match &self.spawn_gate {
            Some(gate) => Some(gate.acquire(request.priority).await?),
            None => None,
        };

        let cols = request.cols.unwrap_or(self.config.default_cols);
        let rows = request.rows.unwrap_or(self.config.default_rows);
        let shell = request
            .shell
            .clone()
            .unwrap_or_else(|| self.config.resolved_shell());
        let cwd = request.cwd.clone().or_else(|| self.config.default_cwd.clone());

        let spawn_request = SpawnRequest {
            shell: shell.clone(),
            args: self.config.shell_args.clone(),
            cwd: cwd.clone(),
            cols,
            rows,
            env: self
                .config
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let backend = Arc::clone(&self.backend);
        let spawned = tokio::task::spawn_blocking(move || backend.spawn(spawn_request))
            .await
            .map_err(|e| TerminalError::Spawn(PtyError::SpawnFailed(e.to_string())))?
            .map_err(TerminalError::Spawn)?;

        let meta = HistoryMeta::started(&shell, cwd.clone(), cols, rows);
        let (history, recovered) = match self
            .history
            .open(&request.workspace_id, &request.pane_id, meta)
            .await
        {
            Ok(opened) => (Some(opened.writer), opened.recovered),
            Err(e) => {
                tracing::warn!(
                    pane_id = %request.pane_id,
                    error = %e,
                    "Failed to open terminal history, continuing without persistence"
                );
                (None, String::new())
            }
        };

        let (entry, exited_tx) = SessionEntry::new(EntryParams {
            pane_id: request.pane_id.clone(),
            tab_id: request.tab_id.clone(),
            workspace_id: request.workspace_id.clone(),
            shell,
            cwd,
            cols,
            rows,
            process: spawned.process,
            history,
            scrollback: ScrollbackBuffer::with_contents(
                self.config.max_scrollback_bytes,
                &recovered,
            ),
        });
        let entry = Arc::new(entry);
        self.sessions()
            .insert(request.pane_id.clone(), Arc::clone(&entry));

        SessionPump {
            entry: Arc::clone(&entry),
            events: spawned.events,
            filters: Arc::clone(&self.filters),
            bus: Arc::clone(&self.events),
            batcher: DataBatcher::new(self.config.batch_interval()),
            exited_tx,
        }
        .spawn();

        tracing::info!(
            pane_id = %request.pane_id,
            workspace_id = %request.workspace_id,
            instance_id = %entry.instance_id,
            pid = ?entry.process().pid(),
            cols,
            rows,
            recovered_bytes = recovered.len(),
            "Terminal session created"
        );

        if !request.initial_commands.is_empty() {
            let input = format!("{}\n", request.initial_commands.join("\n"));
            if let Err(e) = entry.process().write(input.as_bytes()) {
                tracing::warn!(pane_id = %request.pane_id, error = %e, "Failed to write initial commands");
            }
        }

        let was_recovered = !recovered.is_empty();
        Ok(CreateOrAttachResult {
            is_new: true,
            scrollback: recovered,
            was_recovered,
        })
    }

    fn attach(&self, entry: &SessionEntry, request: &CreateOrAttachRequest) -> CreateOrAttachResult {
        let (cols, rows) = entry.size();
        let cols = request.cols.unwrap_or(cols);
        let rows = request.rows.unwrap_or(rows);
        if (cols, rows) != entry.size() {
            match entry.process().resize(cols, rows) {
                Ok(()) => entry.set_size(cols, rows),
                Err(e) => {
                    tracing::warn!(pane_id = %entry.pane_id, error = %e, "Failed to resize on attach")
                }
            }
        }
        entry.set_attached(true);
        entry.touch();
        tracing::debug!(pane_id = %entry.pane_id, "Attached to existing terminal session");

        CreateOrAttachResult {
            is_new: false,
            scrollback: entry.scrollback(),
            was_recovered: false,
        }
    }

    /// Send input to a live session.
    pub fn write(&self, pane_id: &str, data: &str) -> Result<(), TerminalError> {
        let entry = self
            .live(pane_id)
            .ok_or_else(|| TerminalError::SessionNotFound(pane_id.to_string()))?;
        entry.process().write(data.as_bytes())?;
        entry.touch();
        Ok(())
    }

    /// Resize a live session. Unknown or dead panes are ignored.
    pub fn resize(&self, pane_id: &str, cols: u16, rows: u16) {
        let Some(entry) = self.live(pane_id) else {
            tracing::warn!(pane_id = %pane_id, "Resize for unknown or exited session ignored");
            return;
        };
        match entry.process().resize(cols, rows) {
            Ok(()) => {
                entry.set_size(cols, rows);
                entry.touch();
            }
            Err(e) => tracing::warn!(pane_id = %pane_id, error = %e, "Failed to resize session"),
        }
    }

    /// Deliver a signal. Unknown or dead panes are ignored.
    pub fn signal(&self, pane_id: &str, signal: Signal) -> Result<(), TerminalError> {
        let Some(entry) = self.live(pane_id) else {
            tracing::warn!(pane_id = %pane_id, signal = %signal, "Signal for unknown or exited session ignored");
            return Ok(());
        };
        entry.process().signal(signal)?;
        tracing::debug!(pane_id = %pane_id, signal = %signal, "Signal delivered");
        Ok(())
    }

    /// Terminate a session and forget it.
    ///
    /// Succeeds for dead and unknown panes too. With `delete_history` the
    /// pane's history directory is removed even if no session is registered.
    /// A process that survives SIGKILL stays registered and is reported as
    /// [`TerminalError::StillRunning`]; its history is left alone.
    pub async fn kill(&self, pane_id: &str, options: KillOptions) -> Result<(), TerminalError> {
        let pane_lock = self.pane_lock(pane_id);
        let _guard = pane_lock.lock().await;
        self.reap_expired();
        let entry = self.sessions().get(pane_id).cloned();

        let workspace_id = match &entry {
            Some(entry) => {
                if !entry
                    .terminate(self.config.kill_signal, self.config.kill_timeout())
                    .await
                {
                    tracing::warn!(pane_id = %pane_id, "Kill failed, keeping session registered");
                    return Err(TerminalError::StillRunning(pane_id.to_string()));
                }
                self.forget(entry).await;
                Some(entry.workspace_id.clone())
            }
            None => None,
        };

        if options.delete_history {
            self.delete_history(pane_id, workspace_id.as_deref()).await?;
        }
        tracing::info!(pane_id = %pane_id, delete_history = options.delete_history, "Terminal session killed");
        Ok(())
    }

    async fn delete_history(
        &self,
        pane_id: &str,
        workspace_id: Option<&str>,
    ) -> Result<(), TerminalError> {
        let workspaces = match workspace_id {
            Some(ws) => vec![ws.to_string()],
            // Pane ids are unique, so whichever workspace holds it is the owner
            None => self.history.list_workspaces().await?,
        };
        for ws in workspaces {
            if self.history.remove(&ws, pane_id).await? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Close the entry's history and drop it from the registry if it is
    /// still the registered instance for its pane.
    async fn forget(&self, entry: &Arc<SessionEntry>) {
        entry.retire();
        entry.close_history().await;
        let mut sessions = self.sessions();
        if sessions
            .get(&entry.pane_id)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            sessions.remove(&entry.pane_id);
        }
        drop(sessions);

        let mut locks = self.pane_locks();
        // One reference held by the map, one by the caller's guard, if any
        if locks
            .get(&entry.pane_id)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            locks.remove(&entry.pane_id);
        }
    }

    /// Stop routing the pane's events to its subscribers. The process keeps
    /// running.
    pub fn detach(&self, pane_id: &str) {
        let Some(entry) = self.sessions().get(pane_id).cloned() else {
            tracing::warn!(pane_id = %pane_id, "Detach for unknown session ignored");
            return;
        };
        entry.set_attached(false);
        let dropped = self.events.unsubscribe_pane(pane_id);
        tracing::debug!(pane_id = %pane_id, subscriptions = dropped, "Detached from terminal session");
    }

    pub fn get_session(&self, pane_id: &str) -> Option<SessionInfo> {
        self.sessions().get(pane_id).map(|entry| entry.info())
    }

    /// Every registered session, live or retained, sorted by pane id.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self.sessions().values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| a.pane_id.cmp(&b.pane_id));
        infos
    }

    /// Kill every session concurrently and empty the registry. History is
    /// flushed and kept. A process that survives SIGKILL is logged and
    /// dropped; its later output reaches no subscriber.
    pub async fn cleanup(&self) {
        let entries: Vec<_> = self.sessions().drain().map(|(_, entry)| entry).collect();
        let count = entries.len();

        let mut tasks = JoinSet::new();
        for entry in entries {
            let signal = self.config.kill_signal;
            let timeout = self.config.kill_timeout();
            tasks.spawn(async move {
                if !entry.terminate(signal, timeout).await {
                    tracing::warn!(pane_id = %entry.pane_id, "Abandoning session that did not exit");
                }
                entry.retire();
                entry.close_history().await;
            });
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Session cleanup task failed");
            }
        }

        self.pane_locks().clear();
        tracing::info!(sessions = count, "Terminal sessions cleaned up");
    }

    /// Kill every session of a workspace, deleting their history.
    ///
    /// A session counts as failed when its process survives SIGKILL (it
    /// stays registered with its history intact) or when its history
    /// cannot be deleted.
    pub async fn kill_by_workspace_id(&self, workspace_id: &str) -> KillSummary {
        let entries: Vec<_> = self
            .sessions()
            .values()
            .filter(|entry| entry.workspace_id == workspace_id)
            .cloned()
            .collect();

        let mut tasks = JoinSet::new();
        for entry in entries {
            let signal = self.config.kill_signal;
            let timeout = self.config.kill_timeout();
            tasks.spawn(async move {
                let exited = entry.terminate(signal, timeout).await;
                (entry, exited)
            });
        }

        let mut summary = KillSummary::default();
        while let Some(result) = tasks.join_next().await {
            let (entry, exited) = match result {
                Ok(done) => done,
                Err(e) => {
                    tracing::warn!(workspace_id = %workspace_id, error = %e, "Session kill task failed");
                    summary.failed += 1;
                    continue;
                }
            };
            if !exited {
                tracing::warn!(pane_id = %entry.pane_id, "Kill failed, keeping session registered");
                summary.failed += 1;
                continue;
            }
            self.forget(&entry).await;
            match self.history.remove(workspace_id, &entry.pane_id).await {
                Ok(_) => summary.killed += 1,
                Err(e) => {
                    tracing::warn!(pane_id = %entry.pane_id, error = %e, "Failed to delete history");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            workspace_id = %workspace_id,
            killed = summary.killed,
            failed = summary.failed,
            "Workspace sessions killed"
        );
        summary
    }

    /// Live sessions in a workspace.
    pub fn get_session_count_by_workspace_id(&self, workspace_id: &str) -> usize {
        self.sessions()
            .values()
            .filter(|entry| entry.workspace_id == workspace_id && entry.is_alive())
            .count()
    }

    /// Empty the pane's in-memory scrollback and truncate its history.
    ///
    /// Unknown panes are ignored. History failures are logged; the
    /// in-memory scrollback is cleared regardless.
    pub async fn clear_scrollback(&self, pane_id: &str) {
        let Some(entry) = self.sessions().get(pane_id).cloned() else {
            tracing::warn!(pane_id = %pane_id, "Clear scrollback for unknown session ignored");
            return;
        };
        let truncated = match entry.clear_scrollback().await {
            Some(result) => result,
            None => self.history.reinitialize(&entry.workspace_id, pane_id).await,
        };
        match truncated {
            Ok(()) => tracing::debug!(pane_id = %pane_id, "Scrollback cleared"),
            Err(e) => tracing::warn!(
                pane_id = %pane_id,
                error = %e,
                "Scrollback cleared in memory only, history not truncated"
            ),
        }
    }

    /// Events for one pane
    pub fn subscribe(&self, pane_id: &str) -> Subscription {
        self.events.subscribe(pane_id)
    }

    /// Events for every pane
    pub fn subscribe_all(&self) -> Subscription {
        self.events.subscribe_all()
    }

    fn live(&self, pane_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions()
            .get(pane_id)
            .filter(|entry| entry.is_alive())
            .cloned()
    }

    /// Drop sessions that have been dead longer than the retention window.
    fn reap_expired(&self) {
        let now = Instant::now();
        let retention = self.config.exit_retention();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now, retention));
        let reaped = before - sessions.len();
        if reaped > 0 {
            tracing::debug!(reaped, "Reaped exited terminal sessions");
        }
    }

    fn pane_lock(&self, pane_id: &str) -> PaneLock {
        Arc::clone(self.pane_locks().entry(pane_id.to_string()).or_default())
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionEntry>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pane_locks(&self) -> MutexGuard<'_, HashMap<String, PaneLock>> {
        self.pane_locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
