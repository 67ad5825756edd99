//! XDG Base Directory paths for termkeep.
//!
//! Terminal history is user data, so it lives under the XDG data home
//! rather than a platform-native application support directory.

use std::path::PathBuf;

/// Directory name used under the XDG base directories.
const APP_DIR: &str = "termkeep";

/// Name of the scrollback history directory inside [`data_dir`].
pub const HISTORY_DIR_NAME: &str = "terminal-history";

/// Get the termkeep config directory.
///
/// Returns `$XDG_CONFIG_HOME/termkeep` if set, otherwise `~/.config/termkeep`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config").join(APP_DIR)
    } else {
        PathBuf::from(".config").join(APP_DIR)
    }
}

/// Get the termkeep data directory.
///
/// Returns `$XDG_DATA_HOME/termkeep` if set, otherwise `~/.local/share/termkeep`.
///
/// # Examples
///
/// ```
/// use termkeep_paths::data_dir;
///
/// let data = data_dir();
/// assert!(data.ends_with("termkeep"));
/// ```
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share").join(APP_DIR)
    } else {
        PathBuf::from(".local/share").join(APP_DIR)
    }
}

/// Root of the per-workspace, per-pane scrollback history.
///
/// Each pane gets `<history_dir>/<workspace_id>/<pane_id>/`.
pub fn history_dir() -> PathBuf {
    data_dir().join(HISTORY_DIR_NAME)
}
