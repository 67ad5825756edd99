//! One registered session: its process, history writer and mutable state

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use super::scrollback::{Scanned, ScrollbackBuffer};
use super::state::SessionInfo;
use crate::history::{HistoryError, HistoryWriter};
use crate::pty::{ExitStatus, PtyProcess, Signal};

#[derive(Debug)]
struct EntryState {
    cols: u16,
    rows: u16,
    is_alive: bool,
    attached: bool,
    last_active: DateTime<Utc>,
    exited_at: Option<DateTime<Utc>>,
    /// Monotonic exit time, used for retention
    exited: Option<Instant>,
    exit: Option<ExitStatus>,
    scrollback: ScrollbackBuffer,
}

pub(crate) struct SessionEntry {
    pub(crate) pane_id: String,
    pub(crate) tab_id: String,
    pub(crate) workspace_id: String,
    pub(crate) instance_id: Uuid,
    shell: PathBuf,
    cwd: Option<PathBuf>,
    created_at: DateTime<Utc>,
    process: Arc<dyn PtyProcess>,
    history: Option<HistoryWriter>,
    state: Mutex<EntryState>,
    /// Set once the registry has let go of this entry
    retired: AtomicBool,
    exited_rx: watch::Receiver<bool>,
}

pub(crate) struct EntryParams {
    pub pane_id: String,
    pub tab_id: String,
    pub workspace_id: String,
    pub shell: PathBuf,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub process: Arc<dyn PtyProcess>,
    pub history: Option<HistoryWriter>,
    pub scrollback: ScrollbackBuffer,
}

impl SessionEntry {
    /// Build an entry and the sender its pump uses to announce the exit.
    pub(crate) fn new(params: EntryParams) -> (Self, watch::Sender<bool>) {
        let (exited_tx, exited_rx) = watch::channel(false);
        let now = Utc::now();
        let entry = Self {
            pane_id: params.pane_id,
            tab_id: params.tab_id,
            workspace_id: params.workspace_id,
            instance_id: Uuid::new_v4(),
            shell: params.shell,
            cwd: params.cwd,
            created_at: now,
            process: params.process,
            history: params.history,
            state: Mutex::new(EntryState {
                cols: params.cols,
                rows: params.rows,
                is_alive: true,
                attached: true,
                last_active: now,
                exited_at: None,
                exited: None,
                exit: None,
                scrollback: params.scrollback,
            }),
            retired: AtomicBool::new(false),
            exited_rx,
        };
        (entry, exited_tx)
    }

    pub(crate) fn process(&self) -> &Arc<dyn PtyProcess> {
        &self.process
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.lock().is_alive
    }

    pub(crate) fn info(&self) -> SessionInfo {
        let state = self.lock();
        SessionInfo {
            pane_id: self.pane_id.clone(),
            tab_id: self.tab_id.clone(),
            workspace_id: self.workspace_id.clone(),
            instance_id: self.instance_id,
            pid: self.process.pid(),
            cwd: self.cwd.clone(),
            shell: self.shell.clone(),
            cols: state.cols,
            rows: state.rows,
            is_alive: state.is_alive,
            attached: state.attached,
            created_at: self.created_at,
            last_active: state.last_active,
            exited_at: state.exited_at,
            exit_code: state.exit.as_ref().and_then(|e| e.exit_code),
            exit_signal: state.exit.as_ref().and_then(|e| e.signal),
        }
    }

    pub(crate) fn scrollback(&self) -> String {
        self.lock().scrollback.contents().to_string()
    }

    pub(crate) fn size(&self) -> (u16, u16) {
        let state = self.lock();
        (state.cols, state.rows)
    }

    pub(crate) fn set_size(&self, cols: u16, rows: u16) {
        let mut state = self.lock();
        state.cols = cols;
        state.rows = rows;
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.lock().attached = attached;
    }

    pub(crate) fn touch(&self) {
        self.lock().last_active = Utc::now();
    }

    /// Apply scanned output to the in-memory scrollback and the history file.
    ///
    /// Both are updated under the state lock, so a concurrent
    /// [`clear_scrollback`](Self::clear_scrollback) drops a chunk from
    /// memory and disk alike or from neither.
    pub(crate) fn record_output(&self, scanned: &Scanned) {
        let mut state = self.lock();
        if scanned.cleared {
            state.scrollback.clear();
        }
        state.scrollback.append(&scanned.keep);
        state.last_active = Utc::now();
        if let Some(history) = &self.history {
            if scanned.cleared {
                history.truncate();
            }
            history.append(&scanned.keep);
        }
    }

    /// Empty the in-memory scrollback and truncate the open history file.
    ///
    /// Returns `None` when there is no open writer, leaving the file to the
    /// caller.
    pub(crate) async fn clear_scrollback(&self) -> Option<Result<(), HistoryError>> {
        let truncated = {
            let mut state = self.lock();
            state.scrollback.clear();
            self.history
                .as_ref()
                .filter(|history| !history.is_closed())
                .map(|history| history.queue_reinitialize())
        };
        match truncated {
            Some(ack) => Some(ack.await),
            None => None,
        }
    }

    pub(crate) fn mark_exited(&self, status: &ExitStatus) {
        let mut state = self.lock();
        state.is_alive = false;
        state.exited_at = Some(Utc::now());
        state.exited = Some(Instant::now());
        state.exit = Some(status.clone());
    }

    pub(crate) fn exit_code(&self) -> Option<u32> {
        self.lock().exit.as_ref().and_then(|e| e.exit_code)
    }

    /// Dead for at least `retention`
    pub(crate) fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.lock()
            .exited
            .is_some_and(|exited| now.duration_since(exited) >= retention)
    }

    /// Wait up to `timeout` for the pump to finish handling the exit.
    pub(crate) async fn wait_exited(&self, timeout: Duration) -> bool {
        let mut rx = self.exited_rx.clone();
        // A closed channel means the pump is gone
        tokio::time::timeout(timeout, rx.wait_for(|exited| *exited))
            .await
            .is_ok()
    }

    /// Ask the process to exit with `signal`, escalating to SIGKILL if it is
    /// still running after `timeout`. Returns whether the exit was observed.
    pub(crate) async fn terminate(&self, signal: Signal, timeout: Duration) -> bool {
        if !self.is_alive() {
            // Already exiting; let the pump finish announcing it
            return self.wait_exited(timeout).await;
        }
        if let Err(e) = self.process.signal(signal) {
            tracing::debug!(pane_id = %self.pane_id, error = %e, "Termination signal not delivered");
        }
        if self.wait_exited(timeout).await {
            return true;
        }

        tracing::warn!(
            pane_id = %self.pane_id,
            signal = %signal,
            timeout_ms = timeout.as_millis() as u64,
            "Session did not exit, escalating to SIGKILL"
        );
        if let Err(e) = self.process.signal(Signal::Kill) {
            tracing::debug!(pane_id = %self.pane_id, error = %e, "SIGKILL not delivered");
        }
        let exited = self.wait_exited(timeout).await;
        if !exited {
            tracing::warn!(pane_id = %self.pane_id, "Session still running after SIGKILL");
        }
        exited
    }

    /// Stop publishing for this instance. Called when the registry forgets
    /// it, so a process that outlives its record cannot reach the pane's
    /// subscribers.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub(crate) async fn close_history(&self) {
        if let Some(history) = &self.history {
            history.close(self.exit_code()).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
