//! Shared helpers for registry integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use termkeep_core::pty::MockPtyBackend;
use termkeep_core::{
    HistoryStore, OutputFilterChain, SessionRegistry, Subscription, TerminalConfig, TerminalEvent,
    TerminalEventBus,
};

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub backend: Arc<MockPtyBackend>,
    pub dir: TempDir,
}

impl Harness {
    pub fn history_root(&self) -> PathBuf {
        self.dir.path().join("terminal-history")
    }

    pub fn pane_dir(&self, workspace: &str, pane: &str) -> PathBuf {
        self.history_root().join(workspace).join(pane)
    }
}

pub fn test_config() -> TerminalConfig {
    TerminalConfig {
        shell: Some(PathBuf::from("/bin/sh")),
        batch_interval_ms: 16,
        exit_retention_ms: 5_000,
        kill_timeout_ms: 500,
        mock_mode: true,
        ..Default::default()
    }
}

pub fn harness() -> Harness {
    harness_with(MockPtyBackend::new(), test_config())
}

pub fn harness_with(backend: MockPtyBackend, config: TerminalConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(backend);
    let registry = SessionRegistry::new(
        config,
        backend.clone(),
        HistoryStore::new(dir.path().join("terminal-history")),
        Arc::new(OutputFilterChain::new()),
        Arc::new(TerminalEventBus::new()),
    );
    Harness {
        registry: Arc::new(registry),
        backend,
        dir,
    }
}

/// Next event within a generous bound
pub async fn next_event(sub: &mut Subscription) -> TerminalEvent {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for terminal event")
        .expect("subscription closed")
}

/// Next data payload, failing on anything else
pub async fn next_data(sub: &mut Subscription) -> String {
    match next_event(sub).await {
        TerminalEvent::Data { data, .. } => data,
        other => panic!("expected data, got {other:?}"),
    }
}

/// No event arrives within `window`
pub async fn assert_quiet(sub: &mut Subscription, window: Duration) {
    if let Ok(event) = tokio::time::timeout(window, sub.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}
