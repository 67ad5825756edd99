use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use termkeep_core::{Signal, TerminalConfig};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTermkeepConfig {
    #[serde(default)]
    pub terminal: RawTerminalSection,

    #[serde(default)]
    pub attach: RawAttachSection,
}

/// Terminal config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTerminalSection {
    pub shell: Option<PathBuf>,
    pub shell_args: Option<Vec<String>>,
    pub default_cwd: Option<PathBuf>,
    pub default_cols: Option<u16>,
    pub default_rows: Option<u16>,
    pub history_dir: Option<PathBuf>,
    pub batch_interval_ms: Option<u64>,
    pub exit_retention_ms: Option<u64>,
    pub kill_timeout_ms: Option<u64>,
    pub kill_signal: Option<Signal>,
    pub max_scrollback_bytes: Option<usize>,
    pub max_concurrent_spawns: Option<usize>,
    pub daemon_mode: Option<bool>,
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAttachSection {
    /// Forward keystrokes in raw mode instead of line by line
    pub raw: Option<bool>,

    /// Workspace used when `--workspace` is not given
    pub workspace: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TermkeepConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub attach: AttachConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachConfig {
    pub raw: bool,
    pub workspace: String,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            raw: false,
            workspace: DEFAULT_WORKSPACE.to_string(),
        }
    }
}

/// Workspace id used by `termkeep attach` when none is configured
pub const DEFAULT_WORKSPACE: &str = "default";
