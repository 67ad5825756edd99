//! Background writer for one pane's scrollback file
//!
//! Every pane with an open history gets a writer task. Callers enqueue
//! commands and return immediately; the task applies them strictly in order,
//! so appends and truncations interleave on disk exactly as they were issued.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use super::HistoryError;
use super::meta::HistoryMeta;
use super::store::{SCROLLBACK_FILE, atomic_write, write_meta};

enum WriterCommand {
    Append(String),
    Reinitialize(Option<oneshot::Sender<Result<(), HistoryError>>>),
    Close {
        exit_code: Option<u32>,
        done: oneshot::Sender<()>,
    },
}

/// Handle to a pane's history writer task
#[derive(Debug)]
pub struct HistoryWriter {
    label: String,
    tx: mpsc::UnboundedSender<WriterCommand>,
    closed: AtomicBool,
}

impl HistoryWriter {
    pub(super) fn spawn(dir: PathBuf, file: File, meta: HistoryMeta, label: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = WriterTask {
            dir,
            file: Some(file),
            meta,
            label: label.clone(),
            rx,
        };
        tokio::spawn(task.run());
        Self {
            label,
            tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue text to be appended. Ignored once the writer is closed.
    pub fn append(&self, text: &str) {
        if text.is_empty() || self.is_closed() {
            return;
        }
        if self.tx.send(WriterCommand::Append(text.to_string())).is_err() {
            tracing::debug!(history = %self.label, "Append after history writer stopped");
        }
    }

    /// Queue an atomic truncation without waiting for it.
    pub fn truncate(&self) {
        if self.is_closed() {
            return;
        }
        let _ = self.tx.send(WriterCommand::Reinitialize(None));
    }

    /// Atomically truncate the scrollback file, after every append queued
    /// before this call has been written.
    pub async fn reinitialize(&self) -> Result<(), HistoryError> {
        self.queue_reinitialize().await
    }

    /// Queue a truncation now and return a future resolving once it is on
    /// disk. The command takes its place in the queue at call time, so it
    /// can be issued under a caller's lock and awaited after releasing it.
    pub fn queue_reinitialize(
        &self,
    ) -> impl Future<Output = Result<(), HistoryError>> + Send + 'static {
        let label = self.label.clone();
        let (ack_tx, ack_rx) = oneshot::channel();
        let queued = !self.is_closed()
            && self
                .tx
                .send(WriterCommand::Reinitialize(Some(ack_tx)))
                .is_ok();
        async move {
            if !queued {
                return Err(HistoryError::WriterClosed(label));
            }
            match ack_rx.await {
                Ok(result) => result,
                Err(_) => Err(HistoryError::WriterClosed(label)),
            }
        }
    }

    /// Flush pending writes, record how the session ended and stop the task.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn close(&self, exit_code: Option<u32>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .tx
            .send(WriterCommand::Close {
                exit_code,
                done: done_tx,
            })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct WriterTask {
    dir: PathBuf,
    file: Option<File>,
    meta: HistoryMeta,
    label: String,
    rx: mpsc::UnboundedReceiver<WriterCommand>,
}

impl WriterTask {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                WriterCommand::Append(text) => {
                    if let Err(e) = self.append(&text).await {
                        tracing::warn!(history = %self.label, error = %e, "Failed to append history");
                    }
                }
                WriterCommand::Reinitialize(ack) => {
                    let result = self.reinitialize().await;
                    if let Err(e) = &result {
                        tracing::warn!(history = %self.label, error = %e, "Failed to reinitialize history");
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(result);
                    }
                }
                WriterCommand::Close { exit_code, done } => {
                    self.finish(exit_code).await;
                    let _ = done.send(());
                    return;
                }
            }
        }
        // Every handle dropped without close
        self.finish(None).await;
    }

    async fn append(&mut self, text: &str) -> Result<(), HistoryError> {
        if self.file.is_none() {
            self.file = Some(open_append(&self.dir).await?);
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn reinitialize(&mut self) -> Result<(), HistoryError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        atomic_write(&self.dir.join(SCROLLBACK_FILE), b"").await?;
        self.file = Some(open_append(&self.dir).await?);
        tracing::debug!(history = %self.label, "History reinitialized");
        Ok(())
    }

    async fn finish(&mut self, exit_code: Option<u32>) {
        if let Some(mut file) = self.file.take()
            && let Err(e) = file.flush().await
        {
            tracing::warn!(history = %self.label, error = %e, "Failed to flush history");
        }

        self.meta.ended_at = Some(Utc::now());
        self.meta.exit_code = exit_code;
        // The pane directory may already be gone if history was deleted
        if tokio::fs::metadata(&self.dir).await.is_ok()
            && let Err(e) = write_meta(&self.dir, &self.meta).await
        {
            tracing::warn!(history = %self.label, error = %e, "Failed to update history metadata");
        }
        tracing::debug!(history = %self.label, "History writer closed");
    }
}

pub(super) async fn open_append(dir: &std::path::Path) -> Result<File, HistoryError> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(SCROLLBACK_FILE))
        .await?)
}
