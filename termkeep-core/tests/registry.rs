//! SessionRegistry behaviour against the mock PTY backend

mod common;

use std::time::Duration;

use common::{assert_quiet, harness, harness_with, next_data, next_event, test_config};
use termkeep_core::pty::MockPtyBackend;
use termkeep_core::{
    CreateOrAttachRequest, KillOptions, KillSummary, OutputFilter, PrioritySemaphore, Signal,
    TerminalConfig, TerminalError, TerminalEvent,
};

fn request(pane: &str) -> CreateOrAttachRequest {
    CreateOrAttachRequest::new(pane, "tab-1", "ws-1")
}

// ==================== Unknown Pane Tests ====================

#[tokio::test]
async fn unknown_pane_operations_follow_policy() {
    let h = harness();
    let r = &h.registry;

    assert!(r.get_session("nope").is_none());
    assert!(matches!(
        r.write("nope", "ls\n"),
        Err(TerminalError::SessionNotFound(id)) if id == "nope"
    ));

    // Tolerant operations
    r.resize("nope", 100, 30);
    r.signal("nope", Signal::Term).unwrap();
    r.clear_scrollback("nope").await;
    r.detach("nope");
    r.kill("nope", KillOptions::default()).await.unwrap();
    r.kill("nope", KillOptions::delete_history()).await.unwrap();

    assert_eq!(h.backend.spawn_count(), 0);
}

#[tokio::test]
async fn invalid_ids_are_rejected() {
    let h = harness();
    for req in [
        CreateOrAttachRequest::new("", "tab", "ws"),
        CreateOrAttachRequest::new("../x", "tab", "ws"),
        CreateOrAttachRequest::new("pane", "", "ws"),
    ] {
        assert!(matches!(
            h.registry.create_or_attach(req).await,
            Err(TerminalError::InvalidRequest(_))
        ));
    }
    assert_eq!(h.backend.spawn_count(), 0);
}

// ==================== Create / Attach Tests ====================

#[tokio::test]
async fn fresh_create_then_attach_reuses_process() {
    let h = harness();

    let first = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert!(first.is_new);
    assert!(!first.was_recovered);
    assert_eq!(first.scrollback, "");

    let second = h
        .registry
        .create_or_attach(request("p1").with_size(132, 50))
        .await
        .unwrap();
    assert!(!second.is_new);
    assert_eq!(h.backend.spawn_count(), 1);

    let handle = h.backend.last_spawned().unwrap();
    assert_eq!(handle.size(), (132, 50));
    let info = h.registry.get_session("p1").unwrap();
    assert_eq!((info.cols, info.rows), (132, 50));
    assert!(info.is_alive);
    assert!(info.attached);
}

#[tokio::test]
async fn spawn_uses_configured_defaults() {
    let mut config = test_config();
    config.default_cols = 100;
    config.default_rows = 40;
    config.shell_args = vec!["-l".into()];
    config.env.insert("LANG".into(), "C.UTF-8".into());
    let h = harness_with(MockPtyBackend::new(), config);

    h.registry
        .create_or_attach(request("p1").with_cwd("/tmp"))
        .await
        .unwrap();

    let spawned = h.backend.last_spawned().unwrap();
    let req = spawned.request();
    assert_eq!((req.cols, req.rows), (100, 40));
    assert_eq!(req.shell.to_str(), Some("/bin/sh"));
    assert_eq!(req.args, vec!["-l"]);
    assert_eq!(req.cwd.as_deref().and_then(|p| p.to_str()), Some("/tmp"));
    assert!(req.env.contains(&("LANG".to_string(), "C.UTF-8".to_string())));
}

#[tokio::test]
async fn initial_commands_are_newline_joined() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());

    h.registry
        .create_or_attach(request("p1").with_initial_commands(["cd /tmp", "ls"]))
        .await
        .unwrap();

    assert_eq!(h.backend.last_spawned().unwrap().written(), b"cd /tmp\nls\n");
}

#[tokio::test]
async fn spawn_failure_registers_nothing() {
    let h = harness();
    h.backend.fail_next_spawn("no pty");

    let result = h.registry.create_or_attach(request("p1")).await;
    assert!(matches!(result, Err(TerminalError::Spawn(_))));
    assert!(h.registry.get_session("p1").is_none());

    // Next attempt works
    assert!(h.registry.create_or_attach(request("p1")).await.unwrap().is_new);
}

#[tokio::test]
async fn spawn_gate_admits_and_releases() {
    let gate = PrioritySemaphore::new(1);
    let h = harness();
    let registry = std::sync::Arc::try_unwrap(h.registry)
        .ok()
        .unwrap()
        .with_spawn_gate(gate.clone());

    registry.create_or_attach(request("p1")).await.unwrap();
    registry.create_or_attach(request("p2")).await.unwrap();
    assert_eq!(gate.in_use(), 0);
    assert_eq!(h.backend.spawn_count(), 2);
}

// ==================== Output Tests ====================

#[tokio::test]
async fn output_is_batched_and_delivered_once() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();

    handle.emit_output("hello ");
    handle.emit_output("world");

    assert_eq!(next_data(&mut events).await, "hello world");
    assert_quiet(&mut events, Duration::from_millis(60)).await;
}

#[tokio::test]
async fn writes_reach_the_process() {
    let h = harness();
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.registry.write("p1", "echo hi\r").unwrap();

    assert_eq!(h.backend.last_spawned().unwrap().written(), b"echo hi\r");
    // The mock echoes input back
    assert_eq!(next_data(&mut events).await, "echo hi\r");
}

#[tokio::test]
async fn split_utf8_is_reassembled() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();

    let euro = "€".as_bytes();
    handle.emit_output(&euro[..1]);
    handle.emit_output(&euro[1..]);

    assert_eq!(next_data(&mut events).await, "€");
}

#[tokio::test]
async fn filters_apply_to_events_and_history() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    h.registry.filters().register(OutputFilter::new(
        "upper",
        "uppercase everything",
        |s: &str| s.to_uppercase(),
    ));
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.backend.last_spawned().unwrap().emit_output("quiet");
    assert_eq!(next_data(&mut events).await, "QUIET");

    h.registry.kill("p1", KillOptions::default()).await.unwrap();
    assert_eq!(
        h.registry
            .history()
            .read_all("ws-1", "p1")
            .await
            .unwrap()
            .as_deref(),
        Some("QUIET")
    );
}

#[tokio::test]
async fn global_subscription_sees_every_pane() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut all = h.registry.subscribe_all();
    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.backend.last_spawned().unwrap().emit_output("one");

    let event = next_event(&mut all).await;
    assert_eq!(event.pane_id(), "p1");
    assert_eq!(event.channel(), "data:p1");
}

// ==================== Exit Tests ====================

#[tokio::test]
async fn exit_flushes_batch_then_notifies_once() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let instance = h.registry.get_session("p1").unwrap().instance_id;
    let handle = h.backend.last_spawned().unwrap();

    handle.emit_output("last words");
    handle.exit(3);

    assert_eq!(next_data(&mut events).await, "last words");
    assert_eq!(
        next_event(&mut events).await,
        TerminalEvent::Exit {
            pane_id: "p1".into(),
            instance_id: instance,
            exit_code: Some(3),
            signal: None,
        }
    );
    handle.exit(4);
    assert_quiet(&mut events, Duration::from_millis(50)).await;

    // Retained after exit
    let info = h.registry.get_session("p1").unwrap();
    assert!(!info.is_alive);
    assert_eq!(info.exit_code, Some(3));
    assert!(info.exited_at.is_some());
    assert!(matches!(
        h.registry.write("p1", "x"),
        Err(TerminalError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn exited_sessions_are_reaped_after_retention() {
    let mut config = test_config();
    config.exit_retention_ms = 20;
    let h = harness_with(MockPtyBackend::new(), config);
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.backend.last_spawned().unwrap().exit(0);
    assert!(matches!(next_event(&mut events).await, TerminalEvent::Exit { .. }));
    assert!(h.registry.get_session("p1").is_some());

    tokio::time::sleep(Duration::from_millis(40)).await;
    // Any kill pass reaps
    h.registry.kill("other", KillOptions::default()).await.unwrap();
    assert!(h.registry.get_session("p1").is_none());
}

#[tokio::test]
async fn create_after_exit_spawns_fresh_instance() {
    let h = harness();
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let first = h.registry.get_session("p1").unwrap().instance_id;

    h.backend.last_spawned().unwrap().exit(0);
    assert!(matches!(next_event(&mut events).await, TerminalEvent::Exit { .. }));

    let result = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert!(result.is_new);
    let second = h.registry.get_session("p1").unwrap();
    assert!(second.is_alive);
    assert_ne!(second.instance_id, first);
    assert_eq!(h.backend.spawn_count(), 2);
}

// ==================== Signal / Kill Tests ====================

#[tokio::test]
async fn signal_is_delivered_to_live_session() {
    let h = harness_with(MockPtyBackend::new().ignoring_signals(), test_config());
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.registry.signal("p1", Signal::Int).unwrap();
    assert_eq!(h.backend.last_spawned().unwrap().signals(), vec![Signal::Int]);
}

#[tokio::test]
async fn kill_preserves_history_and_removes_record() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.backend.last_spawned().unwrap().emit_output("keep me");
    next_data(&mut events).await;

    h.registry.kill("p1", KillOptions::default()).await.unwrap();

    assert!(h.registry.get_session("p1").is_none());
    assert!(h.backend.last_spawned().unwrap().is_exited());
    assert_eq!(
        h.backend.last_spawned().unwrap().signals(),
        vec![Signal::Hup]
    );
    assert!(h.pane_dir("ws-1", "p1").join("scrollback.bin").exists());

    // Idempotent
    h.registry.kill("p1", KillOptions::default()).await.unwrap();
}

#[tokio::test]
async fn kill_escalates_when_process_ignores_signal() {
    let mut config = test_config();
    config.kill_timeout_ms = 30;
    let h = harness_with(MockPtyBackend::new().ignoring_signals(), config);
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.registry.kill("p1", KillOptions::default()).await.unwrap();

    let handle = h.backend.last_spawned().unwrap();
    assert_eq!(handle.signals(), vec![Signal::Hup, Signal::Kill]);
    assert!(handle.is_exited());
}

#[tokio::test]
async fn kill_keeps_record_of_process_surviving_sigkill() {
    let mut config = test_config();
    config.kill_timeout_ms = 30;
    let h = harness_with(MockPtyBackend::new().unkillable(), config);
    h.registry.create_or_attach(request("p1")).await.unwrap();

    assert!(matches!(
        h.registry.kill("p1", KillOptions::delete_history()).await,
        Err(TerminalError::StillRunning(id)) if id == "p1"
    ));

    let handle = h.backend.last_spawned().unwrap();
    assert_eq!(handle.signals(), vec![Signal::Hup, Signal::Kill]);
    assert!(h.registry.get_session("p1").unwrap().is_alive);
    assert!(h.pane_dir("ws-1", "p1").exists());
    h.registry.write("p1", "still here\n").unwrap();

    // Once it finally goes, kill completes
    handle.exit(0);
    h.registry
        .kill("p1", KillOptions::delete_history())
        .await
        .unwrap();
    assert!(h.registry.get_session("p1").is_none());
    assert!(!h.pane_dir("ws-1", "p1").exists());
}

#[tokio::test]
async fn kill_with_delete_history_removes_directory() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.backend.last_spawned().unwrap().emit_output("secret");
    next_data(&mut events).await;

    h.registry
        .kill("p1", KillOptions::delete_history())
        .await
        .unwrap();

    assert!(!h.pane_dir("ws-1", "p1").exists());
    let again = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert!(!again.was_recovered);
    assert_eq!(again.scrollback, "");
}

#[tokio::test]
async fn delete_history_for_unregistered_pane() {
    let h = harness();
    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.registry.kill("p1", KillOptions::default()).await.unwrap();
    assert!(h.pane_dir("ws-1", "p1").exists());

    h.registry
        .kill("p1", KillOptions::delete_history())
        .await
        .unwrap();
    assert!(!h.pane_dir("ws-1", "p1").exists());
}

// ==================== Recovery Tests ====================

#[tokio::test]
async fn recovery_accumulates_across_kill_cycles() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");

    let mut expected = String::new();
    for round in ["first\r\n", "second\r\n", "third\r\n"] {
        let result = h.registry.create_or_attach(request("p1")).await.unwrap();
        assert!(result.is_new);
        assert_eq!(result.was_recovered, !expected.is_empty());
        assert_eq!(result.scrollback, expected);

        h.backend.last_spawned().unwrap().emit_output(round);
        assert_eq!(next_data(&mut events).await, round);
        expected.push_str(round);

        h.registry.kill("p1", KillOptions::default()).await.unwrap();
        assert!(matches!(next_event(&mut events).await, TerminalEvent::Exit { .. }));
    }

    let meta = h.registry.history().read_meta("ws-1", "p1").await.unwrap().unwrap();
    assert!(meta.ended_at.is_some());
}

#[tokio::test]
async fn attach_returns_recovered_and_new_output() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");

    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.backend.last_spawned().unwrap().emit_output("old ");
    next_data(&mut events).await;
    h.registry.kill("p1", KillOptions::default()).await.unwrap();

    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.backend.last_spawned().unwrap().emit_output("new");
    next_data(&mut events).await;

    let attached = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert!(!attached.is_new);
    assert_eq!(attached.scrollback, "old new");
}

// ==================== Clear Scrollback Tests ====================

#[tokio::test]
async fn clear_sequence_truncates_history() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.backend
        .last_spawned()
        .unwrap()
        .emit_output("old content\x1b[3Jnew content");
    // Subscribers still see the sequence so views can clear themselves
    assert_eq!(
        next_data(&mut events).await,
        "old content\x1b[3Jnew content"
    );

    let attached = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert_eq!(attached.scrollback, "new content");

    h.registry.kill("p1", KillOptions::default()).await.unwrap();
    let recovered = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert_eq!(recovered.scrollback, "new content");
}

#[tokio::test]
async fn clear_sequence_split_across_reads() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();

    handle.emit_output("before\x1b[");
    assert_eq!(next_data(&mut events).await, "before\x1b[");
    handle.emit_output("3Jafter");
    assert_eq!(next_data(&mut events).await, "3Jafter");

    h.registry.kill("p1", KillOptions::default()).await.unwrap();
    assert_eq!(
        h.registry
            .history()
            .read_all("ws-1", "p1")
            .await
            .unwrap()
            .as_deref(),
        Some("after")
    );
}

#[tokio::test]
async fn clear_scrollback_survives_missing_history_dir() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();
    handle.emit_output("noise");
    next_data(&mut events).await;

    std::fs::remove_dir_all(h.pane_dir("ws-1", "p1")).unwrap();
    h.registry.clear_scrollback("p1").await;

    // Memory is cleared and the session keeps working
    let attached = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert!(!attached.is_new);
    assert_eq!(attached.scrollback, "");
    handle.emit_output("after");
    assert_eq!(next_data(&mut events).await, "after");
    assert!(h.registry.get_session("p1").unwrap().is_alive);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clear_scrollback_racing_output_keeps_memory_and_disk_in_step() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();

    let writer = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                handle.emit_output(format!("{i};"));
                tokio::task::yield_now().await;
            }
        })
    };
    for _ in 0..20 {
        h.registry.clear_scrollback("p1").await;
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    // Drain until the final chunk has been recorded
    loop {
        if next_data(&mut events).await.ends_with("199;") {
            break;
        }
    }
    let memory = h
        .registry
        .create_or_attach(request("p1"))
        .await
        .unwrap()
        .scrollback;
    h.registry.kill("p1", KillOptions::default()).await.unwrap();
    let disk = h
        .registry
        .history()
        .read_all("ws-1", "p1")
        .await
        .unwrap()
        .unwrap_or_default();
    assert_eq!(memory, disk);
}

#[tokio::test]
async fn clear_scrollback_empties_memory_and_disk() {
    let h = harness_with(MockPtyBackend::new().without_echo(), test_config());
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let handle = h.backend.last_spawned().unwrap();
    handle.emit_output("noise");
    next_data(&mut events).await;

    h.registry.clear_scrollback("p1").await;
    assert_eq!(
        h.registry.history().read_all("ws-1", "p1").await.unwrap().as_deref(),
        Some("")
    );

    handle.emit_output("signal");
    next_data(&mut events).await;
    let attached = h.registry.create_or_attach(request("p1")).await.unwrap();
    assert_eq!(attached.scrollback, "signal");
}

// ==================== Detach Tests ====================

#[tokio::test]
async fn detach_ends_subscriptions_but_keeps_process() {
    let h = harness();
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();

    h.registry.detach("p1");

    assert_eq!(events.recv().await, None);
    let info = h.registry.get_session("p1").unwrap();
    assert!(info.is_alive);
    assert!(!info.attached);
    assert!(!h.backend.last_spawned().unwrap().is_exited());
}

// ==================== Workspace Tests ====================

#[tokio::test]
async fn kill_by_workspace_only_touches_that_workspace() {
    let h = harness();
    for (pane, ws) in [("a1", "ws-a"), ("a2", "ws-a"), ("b1", "ws-b")] {
        h.registry
            .create_or_attach(CreateOrAttachRequest::new(pane, "tab", ws))
            .await
            .unwrap();
    }
    assert_eq!(h.registry.get_session_count_by_workspace_id("ws-a"), 2);

    let summary = h.registry.kill_by_workspace_id("ws-a").await;
    assert_eq!(summary, KillSummary { killed: 2, failed: 0 });

    assert_eq!(h.registry.get_session_count_by_workspace_id("ws-a"), 0);
    assert_eq!(h.registry.get_session_count_by_workspace_id("ws-b"), 1);
    assert!(h.registry.get_session("a1").is_none());
    assert!(!h.pane_dir("ws-a", "a1").exists());
    assert!(!h.pane_dir("ws-a", "a2").exists());
    assert!(h.pane_dir("ws-b", "b1").exists());
}

#[tokio::test]
async fn kill_by_workspace_removes_retained_dead_session() {
    let h = harness();
    let mut events = h.registry.subscribe("a1");
    h.registry
        .create_or_attach(CreateOrAttachRequest::new("a1", "tab", "ws-a"))
        .await
        .unwrap();
    h.backend.last_spawned().unwrap().exit(0);
    assert!(matches!(next_event(&mut events).await, TerminalEvent::Exit { .. }));
    assert!(!h.registry.get_session("a1").unwrap().is_alive);

    let summary = h.registry.kill_by_workspace_id("ws-a").await;

    assert_eq!(summary, KillSummary { killed: 1, failed: 0 });
    assert!(h.registry.get_session("a1").is_none());
    assert!(!h.pane_dir("ws-a", "a1").exists());
}

#[tokio::test]
async fn kill_by_workspace_counts_survivors_as_failed() {
    let mut config = test_config();
    config.kill_timeout_ms = 30;
    let h = harness_with(MockPtyBackend::new().unkillable(), config);
    h.registry
        .create_or_attach(CreateOrAttachRequest::new("a1", "tab", "ws-a"))
        .await
        .unwrap();

    let summary = h.registry.kill_by_workspace_id("ws-a").await;

    assert_eq!(summary, KillSummary { killed: 0, failed: 1 });
    assert!(h.registry.get_session("a1").unwrap().is_alive);
    assert!(h.pane_dir("ws-a", "a1").exists());
}

#[tokio::test]
async fn workspace_count_is_alive_only() {
    let h = harness();
    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    h.registry.create_or_attach(request("p2")).await.unwrap();
    assert_eq!(h.registry.get_session_count_by_workspace_id("ws-1"), 2);

    h.backend.spawned()[0].exit(0);
    assert!(matches!(next_event(&mut events).await, TerminalEvent::Exit { .. }));

    assert_eq!(h.registry.get_session_count_by_workspace_id("ws-1"), 1);
    // Still listed while retained
    assert_eq!(h.registry.list_sessions().len(), 2);
}

// ==================== Cleanup Tests ====================

#[tokio::test]
async fn cleanup_kills_everything_and_keeps_history() {
    let h = harness();
    for pane in ["p1", "p2", "p3"] {
        h.registry.create_or_attach(request(pane)).await.unwrap();
    }

    h.registry.cleanup().await;

    assert!(h.registry.list_sessions().is_empty());
    assert!(h.backend.spawned().iter().all(|p| p.is_exited()));
    for pane in ["p1", "p2", "p3"] {
        assert!(h.pane_dir("ws-1", pane).exists());
    }
}

#[tokio::test]
async fn abandoned_process_cannot_reach_successor_subscribers() {
    let mut config = test_config();
    config.kill_timeout_ms = 30;
    let h = harness_with(MockPtyBackend::new().unkillable().without_echo(), config);
    h.registry.create_or_attach(request("p1")).await.unwrap();

    // Shutdown gives up on the stuck process and forgets it
    h.registry.cleanup().await;
    assert!(h.registry.list_sessions().is_empty());

    let mut events = h.registry.subscribe("p1");
    h.registry.create_or_attach(request("p1")).await.unwrap();
    let successor = h.registry.get_session("p1").unwrap().instance_id;
    let spawned = h.backend.spawned();
    let (stale, fresh) = (&spawned[0], &spawned[1]);

    stale.emit_output("stale");
    stale.exit(1);
    fresh.emit_output("fresh");

    let event = next_event(&mut events).await;
    assert_eq!(event.instance_id(), successor);
    assert!(matches!(event, TerminalEvent::Data { data, .. } if data == "fresh"));
    assert_quiet(&mut events, Duration::from_millis(50)).await;
    assert!(h.registry.get_session("p1").unwrap().is_alive);
}

#[tokio::test]
async fn list_sessions_is_sorted() {
    let h = harness();
    for pane in ["c", "a", "b"] {
        h.registry.create_or_attach(request(pane)).await.unwrap();
    }
    let panes: Vec<_> = h
        .registry
        .list_sessions()
        .into_iter()
        .map(|s| s.pane_id)
        .collect();
    assert_eq!(panes, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn config_defaults_are_usable() {
    // Default config plus mock backend is a working registry
    let dir = tempfile::TempDir::new().unwrap();
    let config = TerminalConfig {
        mock_mode: true,
        history_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let registry = termkeep_core::SessionRegistry::from_config(config);
    let result = registry.create_or_attach(request("p1")).await.unwrap();
    assert!(result.is_new);
    registry.cleanup().await;
}
