//! Terminal manager configuration

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pty::Signal;

/// Output coalescing window (~one frame at 60Hz)
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 16;

/// How long an exited session stays queryable before it may be reaped
pub const DEFAULT_EXIT_RETENTION_MS: u64 = 5_000;

/// Upper bound on each wait for a process to exit during kill
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 3_000;

/// In-memory scrollback cap per session: 5MB
pub const DEFAULT_MAX_SCROLLBACK_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Configuration for the session registry and the sessions it spawns.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell to spawn; falls back to `$SHELL`, then `/bin/sh`
    pub shell: Option<PathBuf>,
    /// Arguments passed to the shell
    pub shell_args: Vec<String>,
    /// Working directory when the caller does not supply one
    pub default_cwd: Option<PathBuf>,
    pub default_cols: u16,
    pub default_rows: u16,
    /// Scrollback history root; defaults to `<data_dir>/terminal-history`
    pub history_dir: Option<PathBuf>,
    pub batch_interval_ms: u64,
    pub exit_retention_ms: u64,
    pub kill_timeout_ms: u64,
    /// Signal used to ask a session to terminate before escalating to SIGKILL.
    /// Interactive shells ignore SIGTERM, so the default is a hang-up.
    pub kill_signal: Signal,
    pub max_scrollback_bytes: usize,
    /// Bound on concurrent spawns; unbounded when unset
    pub max_concurrent_spawns: Option<usize>,
    /// Host sessions in the background daemon instead of in-process
    pub daemon_mode: bool,
    /// Use the in-memory PTY backend (enabled via TERMKEEP_MOCK_PTY=1)
    pub mock_mode: bool,
    /// Extra environment for spawned shells
    pub env: BTreeMap<String, String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        // Check for mock mode (useful for CI testing without real PTY)
        let mock_mode = std::env::var("TERMKEEP_MOCK_PTY")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            shell: None,
            shell_args: Vec::new(),
            default_cwd: None,
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
            history_dir: None,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            exit_retention_ms: DEFAULT_EXIT_RETENTION_MS,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
            kill_signal: Signal::Hup,
            max_scrollback_bytes: DEFAULT_MAX_SCROLLBACK_BYTES,
            max_concurrent_spawns: None,
            daemon_mode: false,
            mock_mode,
            env: BTreeMap::new(),
        }
    }
}

impl TerminalConfig {
    /// Shell that will actually be spawned.
    pub fn resolved_shell(&self) -> PathBuf {
        self.shell.clone().unwrap_or_else(default_shell)
    }

    /// Directory that holds per-pane history.
    pub fn history_root(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(termkeep_paths::history_dir)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms.max(1))
    }

    pub fn exit_retention(&self) -> Duration {
        Duration::from_millis(self.exit_retention_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// Returns the user's default shell, falling back to `/bin/sh`.
fn default_shell() -> PathBuf {
    std::env::var_os("SHELL")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/bin/sh"))
}
