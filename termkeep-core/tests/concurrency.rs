//! Concurrency tests for SessionRegistry
//!
//! These tests validate that per-pane locking works correctly:
//! - Racing create-or-attach calls for one pane spawn exactly one process
//! - A slow kill on one pane does not block other panes
//! - Output order is preserved per pane under interleaving

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{harness, harness_with, next_data, test_config};
use termkeep_core::pty::MockPtyBackend;
use termkeep_core::{CreateOrAttachRequest, KillOptions};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_spawn_one_process() {
    let h = harness();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&h.registry);
        handles.push(tokio::spawn(async move {
            registry
                .create_or_attach(CreateOrAttachRequest::new("shared", "tab", "ws"))
                .await
                .unwrap()
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        if handle.await.unwrap().is_new {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1, "exactly one caller should spawn");
    assert_eq!(h.backend.spawn_count(), 1);
    assert_eq!(h.registry.get_session_count_by_workspace_id("ws"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_kill_does_not_block_other_panes() {
    let mut config = test_config();
    config.kill_timeout_ms = 150;
    let h = harness_with(MockPtyBackend::new().ignoring_signals(), config);

    h.registry
        .create_or_attach(CreateOrAttachRequest::new("stubborn", "tab", "ws"))
        .await
        .unwrap();

    let registry = Arc::clone(&h.registry);
    let kill = tokio::spawn(async move {
        registry
            .kill("stubborn", KillOptions::default())
            .await
            .unwrap()
    });

    // Give the kill time to start waiting
    tokio::time::sleep(Duration::from_millis(10)).await;

    let start = Instant::now();
    let sessions = h.registry.list_sessions();
    let created = h
        .registry
        .create_or_attach(CreateOrAttachRequest::new("other", "tab", "ws"))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(sessions.len(), 1);
    assert!(created.is_new);
    assert!(
        elapsed < Duration::from_millis(100),
        "other pane blocked for {:?}",
        elapsed
    );

    kill.await.unwrap();
    assert!(h.registry.get_session("stubborn").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_output_keeps_per_pane_order() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut subs = Vec::new();
    for pane in ["left", "right"] {
        subs.push(h.registry.subscribe(pane));
        h.registry
            .create_or_attach(CreateOrAttachRequest::new(pane, "tab", "ws"))
            .await
            .unwrap();
    }
    let processes = h.backend.spawned();

    let mut expected = vec![String::new(), String::new()];
    for i in 0..200 {
        for (idx, process) in processes.iter().enumerate() {
            let chunk = format!("{idx}:{i};");
            process.emit_output(&chunk);
            expected[idx].push_str(&chunk);
        }
    }

    for (idx, sub) in subs.iter_mut().enumerate() {
        let mut received = String::new();
        while received.len() < expected[idx].len() {
            received.push_str(&next_data(sub).await);
        }
        assert_eq!(received, expected[idx]);
    }
}
