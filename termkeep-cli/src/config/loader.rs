use super::types::{
    AttachConfig, DEFAULT_WORKSPACE, RawAttachSection, RawTermkeepConfig, RawTerminalSection,
    TermkeepConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use termkeep_core::TerminalConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<TermkeepConfig> {
        let mut raw = RawTermkeepConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "termkeep").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TERMKEEP_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TERMKEEP_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".termkeep/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawTermkeepConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTermkeepConfig, overlay: RawTermkeepConfig) -> RawTermkeepConfig {
        let (b, o) = (base.terminal, overlay.terminal);
        RawTermkeepConfig {
            terminal: RawTerminalSection {
                shell: o.shell.or(b.shell),
                shell_args: o.shell_args.or(b.shell_args),
                default_cwd: o.default_cwd.or(b.default_cwd),
                default_cols: o.default_cols.or(b.default_cols),
                default_rows: o.default_rows.or(b.default_rows),
                history_dir: o.history_dir.or(b.history_dir),
                batch_interval_ms: o.batch_interval_ms.or(b.batch_interval_ms),
                exit_retention_ms: o.exit_retention_ms.or(b.exit_retention_ms),
                kill_timeout_ms: o.kill_timeout_ms.or(b.kill_timeout_ms),
                kill_signal: o.kill_signal.or(b.kill_signal),
                max_scrollback_bytes: o.max_scrollback_bytes.or(b.max_scrollback_bytes),
                max_concurrent_spawns: o.max_concurrent_spawns.or(b.max_concurrent_spawns),
                daemon_mode: o.daemon_mode.or(b.daemon_mode),
                // Env tables merge key by key
                env: match (b.env, o.env) {
                    (Some(mut base_env), Some(overlay_env)) => {
                        base_env.extend(overlay_env);
                        Some(base_env)
                    }
                    (base_env, overlay_env) => overlay_env.or(base_env),
                },
            },
            attach: RawAttachSection {
                raw: overlay.attach.raw.or(base.attach.raw),
                workspace: overlay.attach.workspace.or(base.attach.workspace),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTermkeepConfig) -> TermkeepConfig {
        let defaults = TerminalConfig::default();
        let t = raw.terminal;
        TermkeepConfig {
            terminal: TerminalConfig {
                shell: t.shell.or(defaults.shell),
                shell_args: t.shell_args.unwrap_or(defaults.shell_args),
                default_cwd: t.default_cwd.or(defaults.default_cwd),
                default_cols: t.default_cols.unwrap_or(defaults.default_cols),
                default_rows: t.default_rows.unwrap_or(defaults.default_rows),
                history_dir: t.history_dir.or(defaults.history_dir),
                batch_interval_ms: t.batch_interval_ms.unwrap_or(defaults.batch_interval_ms),
                exit_retention_ms: t.exit_retention_ms.unwrap_or(defaults.exit_retention_ms),
                kill_timeout_ms: t.kill_timeout_ms.unwrap_or(defaults.kill_timeout_ms),
                kill_signal: t.kill_signal.unwrap_or(defaults.kill_signal),
                max_scrollback_bytes: t
                    .max_scrollback_bytes
                    .unwrap_or(defaults.max_scrollback_bytes),
                max_concurrent_spawns: t.max_concurrent_spawns.or(defaults.max_concurrent_spawns),
                daemon_mode: t.daemon_mode.unwrap_or(defaults.daemon_mode),
                mock_mode: defaults.mock_mode,
                env: t.env.unwrap_or(defaults.env),
            },
            attach: AttachConfig {
                raw: raw.attach.raw.unwrap_or(false),
                workspace: raw
                    .attach
                    .workspace
                    .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()),
            },
        }
    }

    /// Load config from a single file, applying defaults (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<TermkeepConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(TermkeepConfig::default())
        }
    }
}
