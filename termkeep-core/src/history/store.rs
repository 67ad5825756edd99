//! On-disk layout of terminal history
//!
//! ```text
//! <root>/<workspace_id>/<pane_id>/scrollback.bin
//! <root>/<workspace_id>/<pane_id>/meta.json
//! ```
//!
//! `scrollback.bin` is the UTF-8 text emitted by the pane since its last
//! clear, appended across every session the pane has had.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::HistoryError;
use super::meta::HistoryMeta;
use super::writer::{HistoryWriter, open_append};

pub(super) const SCROLLBACK_FILE: &str = "scrollback.bin";
pub(super) const META_FILE: &str = "meta.json";

/// Root of every pane's history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

/// An opened pane history: the writer for the new session and whatever the
/// previous sessions left behind.
#[derive(Debug)]
pub struct OpenedHistory {
    pub writer: HistoryWriter,
    pub recovered: String,
}

impl OpenedHistory {
    pub fn was_recovered(&self) -> bool {
        !self.recovered.is_empty()
    }
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one pane's history.
    pub fn pane_dir(&self, workspace_id: &str, pane_id: &str) -> Result<PathBuf, HistoryError> {
        validate_component("workspace id", workspace_id)?;
        validate_component("pane id", pane_id)?;
        Ok(self.root.join(workspace_id).join(pane_id))
    }

    /// Open a pane's history for a new session.
    ///
    /// Reads back existing scrollback, writes fresh metadata and starts the
    /// writer task. A scrollback file that cannot be read is treated as
    /// empty.
    pub async fn open(
        &self,
        workspace_id: &str,
        pane_id: &str,
        meta: HistoryMeta,
    ) -> Result<OpenedHistory, HistoryError> {
        let dir = self.pane_dir(workspace_id, pane_id)?;
        fs::create_dir_all(&dir).await?;

        let recovered = match read_scrollback(&dir).await {
            Ok(text) => text.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    workspace_id = %workspace_id,
                    pane_id = %pane_id,
                    error = %e,
                    "Failed to read history, starting empty"
                );
                String::new()
            }
        };

        write_meta(&dir, &meta).await?;
        let file = open_append(&dir).await?;

        tracing::debug!(
            workspace_id = %workspace_id,
            pane_id = %pane_id,
            recovered_bytes = recovered.len(),
            "Opened terminal history"
        );

        let writer = HistoryWriter::spawn(dir, file, meta, format!("{workspace_id}/{pane_id}"));
        Ok(OpenedHistory { writer, recovered })
    }

    /// Full scrollback for a pane, or `None` if it has no history.
    pub async fn read_all(
        &self,
        workspace_id: &str,
        pane_id: &str,
    ) -> Result<Option<String>, HistoryError> {
        read_scrollback(&self.pane_dir(workspace_id, pane_id)?).await
    }

    pub async fn read_meta(
        &self,
        workspace_id: &str,
        pane_id: &str,
    ) -> Result<Option<HistoryMeta>, HistoryError> {
        let path = self.pane_dir(workspace_id, pane_id)?.join(META_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Truncate a pane's scrollback without an open writer.
    ///
    /// Panes with a live session must go through their
    /// [`HistoryWriter::reinitialize`] instead so queued appends are not lost.
    pub async fn reinitialize(&self, workspace_id: &str, pane_id: &str) -> Result<(), HistoryError> {
        let dir = self.pane_dir(workspace_id, pane_id)?;
        fs::create_dir_all(&dir).await?;
        atomic_write(&dir.join(SCROLLBACK_FILE), b"").await
    }

    /// Delete a pane's history directory. Returns whether it existed.
    pub async fn remove(&self, workspace_id: &str, pane_id: &str) -> Result<bool, HistoryError> {
        let dir = self.pane_dir(workspace_id, pane_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(workspace_id = %workspace_id, pane_id = %pane_id, "Deleted terminal history");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Workspaces that have stored history, sorted.
    pub async fn list_workspaces(&self) -> Result<Vec<String>, HistoryError> {
        list_dirs(&self.root).await
    }

    /// Panes of a workspace that have stored history, sorted.
    pub async fn list_panes(&self, workspace_id: &str) -> Result<Vec<String>, HistoryError> {
        validate_component("workspace id", workspace_id)?;
        list_dirs(&self.root.join(workspace_id)).await
    }
}

fn validate_component(kind: &'static str, value: &str) -> Result<(), HistoryError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(HistoryError::InvalidPathComponent {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

async fn read_scrollback(dir: &Path) -> Result<Option<String>, HistoryError> {
    match fs::read(dir.join(SCROLLBACK_FILE)).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dirs(dir: &Path) -> Result<Vec<String>, HistoryError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir()
            && let Ok(name) = entry.file_name().into_string()
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Write to a temp file next to `target`, then rename over it.
pub(super) async fn atomic_write(target: &Path, content: &[u8]) -> Result<(), HistoryError> {
    let temp_path = target.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&temp_path, target).await?;
    Ok(())
}

pub(super) async fn write_meta(dir: &Path, meta: &HistoryMeta) -> Result<(), HistoryError> {
    let json = serde_json::to_vec_pretty(meta)?;
    atomic_write(&dir.join(META_FILE), &json).await
}
