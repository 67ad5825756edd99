//! Per-session output pump
//!
//! One task per session consumes the PTY event stream in order. For each
//! output chunk it decodes, filters, records to scrollback and history, and
//! batches for subscribers. On exit it flushes everything and publishes the
//! exit notification exactly once.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

use super::decoder::Utf8Decoder;
use super::entry::SessionEntry;
use super::scrollback::{ClearScrollbackScanner, Scanned};
use crate::batcher::DataBatcher;
use crate::events::{TerminalEvent, TerminalEventBus};
use crate::filter::OutputFilterChain;
use crate::pty::{ExitStatus, PtyEvent};

pub(crate) struct SessionPump {
    pub entry: Arc<SessionEntry>,
    pub events: mpsc::UnboundedReceiver<PtyEvent>,
    pub filters: Arc<OutputFilterChain>,
    pub bus: Arc<TerminalEventBus>,
    pub batcher: DataBatcher,
    pub exited_tx: watch::Sender<bool>,
}

impl SessionPump {
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let mut decoder = Utf8Decoder::new();
        let mut scanner = ClearScrollbackScanner::new();

        loop {
            let deadline = self.batcher.deadline();
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(PtyEvent::Data(bytes)) => {
                        let text = decoder.decode(&bytes);
                        self.on_output(&text, &mut scanner);
                    }
                    Some(PtyEvent::Exit(status)) => {
                        let tail = decoder.finish();
                        self.on_output(&tail, &mut scanner);
                        self.on_exit(status, &mut scanner).await;
                        return;
                    }
                    None => {
                        tracing::warn!(pane_id = %self.entry.pane_id, "PTY event stream ended without exit status");
                        let tail = decoder.finish();
                        self.on_output(&tail, &mut scanner);
                        self.on_exit(ExitStatus::default(), &mut scanner).await;
                        return;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush();
                }
            }
        }
    }

    fn on_output(&mut self, text: &str, scanner: &mut ClearScrollbackScanner) {
        if text.is_empty() {
            return;
        }
        let filtered = self.filters.apply(text);
        if filtered.is_empty() {
            return;
        }
        let scanned = scanner.scan(&filtered);
        if scanned.cleared {
            tracing::debug!(pane_id = %self.entry.pane_id, "Clear-scrollback sequence in output");
        }
        self.entry.record_output(&scanned);
        self.batcher.push(&filtered);
    }

    fn flush(&mut self) {
        if let Some(data) = self.batcher.take() {
            self.publish(TerminalEvent::Data {
                pane_id: self.entry.pane_id.clone(),
                instance_id: self.entry.instance_id,
                data,
            });
        }
    }

    /// Publish unless the registry has already forgotten this instance; the
    /// pane may belong to a successor by now.
    fn publish(&self, event: TerminalEvent) {
        if self.entry.is_retired() {
            tracing::debug!(
                pane_id = %self.entry.pane_id,
                instance_id = %self.entry.instance_id,
                channel = %event.channel(),
                "Dropping event from forgotten session"
            );
            return;
        }
        self.bus.publish(event);
    }

    async fn on_exit(&mut self, status: ExitStatus, scanner: &mut ClearScrollbackScanner) {
        let held = scanner.finish();
        if !held.is_empty() {
            self.entry.record_output(&Scanned {
                cleared: false,
                keep: held,
            });
        }
        self.flush();

        // History is complete on disk before anyone learns of the exit
        self.entry.mark_exited(&status);
        self.entry.close_history().await;

        tracing::info!(
            pane_id = %self.entry.pane_id,
            instance_id = %self.entry.instance_id,
            exit_code = ?status.exit_code,
            signal = ?status.signal,
            "Terminal session exited"
        );
        self.publish(TerminalEvent::exit(
            self.entry.pane_id.clone(),
            self.entry.instance_id,
            &status,
        ));
        let _ = self.exited_tx.send(true);
    }
}
