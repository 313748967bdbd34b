mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FailingLines, MemoryConnector, MemoryLines, RecordingDisplay, HEARTBEAT};
use lib_common::{AppendLog, EndReason, FeedConfig, Notice, ReconnectSupervisor, Sinks};
use serde_json::json;
use tempfile::tempdir;
use tokio::time::sleep;

fn test_config() -> FeedConfig {
    FeedConfig {
        event_id: "abc".to_string(),
        max_recent_messages: 3,
        ..FeedConfig::default()
    }
}

fn fact(amount: &str) -> String {
    json!(["3", "3", "fact.abc.fact", "fact", {"totalAmountRaised": amount}]).to_string()
}

#[tokio::test(start_paused = true)]
async fn reconnect_keeps_counters_and_silences_the_old_heartbeat() {
    let (connector, mut remotes) = MemoryConnector::new(0);
    let connector = Arc::new(connector);
    let (display, mut rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let raw_log = Arc::new(MemoryLines::default());
    let sinks = Sinks {
        display: display.clone(),
        raw_log: raw_log.clone(),
        amount_log: Arc::new(MemoryLines::default()),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), connector.clone(), sinks));
    let counters = supervisor.counters();
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    // Session 1: two joins, then nothing until the first interval elapses.
    let mut first = remotes.recv().await.expect("first session");
    assert_eq!(first.next_sent().await.unwrap(), r#"["3","3","fact.abc.fact","phx_join",{}]"#);
    assert_eq!(first.next_sent().await.unwrap(), r#"["6","6","fact.abc.reward","phx_join",{}]"#);
    assert!(first.sent.try_recv().is_err());

    first.push(&fact("$10"));
    first.push("not a frame");
    assert_eq!(rendered.recv().await.unwrap().total_messages, 1);
    assert_eq!(rendered.recv().await.unwrap().total_messages, 2);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(first.next_sent().await.unwrap(), HEARTBEAT);

    // Remote close: a second session replaces the first.
    first.close();
    let mut second = remotes.recv().await.expect("second session");
    assert_eq!(connector.attempts(), 2);

    // The old link goes quiet for good once its session is gone.
    sleep(Duration::from_secs(120)).await;
    assert_eq!(first.next_sent().await, None);

    {
        let counters = counters.lock().unwrap();
        assert_eq!(counters.total_messages(), 2);
        assert_eq!(counters.recent_messages().collect::<Vec<_>>(), [fact("$10").as_str(), "not a frame"]);
    }

    // Session 2 joins again and keeps counting from where session 1 stopped.
    assert!(second.next_sent().await.unwrap().contains("phx_join"));
    assert!(second.next_sent().await.unwrap().contains("phx_join"));
    second.push(&fact("$20"));
    assert_eq!(rendered.recv().await.unwrap().total_messages, 3);
    assert_eq!(raw_log.lines().len(), 3);

    assert!(display.notices().contains(&Notice::Closed { session: 1, reason: EndReason::RemoteClose }));

    supervisor.shutdown();
    assert_eq!(runner.await.unwrap(), 2);
    assert!(remotes.try_recv().is_err(), "no session after shutdown");
}

#[tokio::test(start_paused = true)]
async fn refused_connections_are_retried_until_one_succeeds() {
    let (connector, mut remotes) = MemoryConnector::new(4);
    let connector = Arc::new(connector);
    let (display, _rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let sinks = Sinks {
        display: display.clone(),
        raw_log: Arc::new(MemoryLines::default()),
        amount_log: Arc::new(MemoryLines::default()),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), connector.clone(), sinks));
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let mut remote = remotes.recv().await.expect("eventual session");
    assert_eq!(connector.attempts(), 5);
    assert!(remote.next_sent().await.unwrap().contains("phx_join"));

    let notices = display.notices();
    let failures = notices
        .iter()
        .filter(|n| matches!(n, Notice::Closed { reason: EndReason::Error(_), .. }))
        .count();
    let retries = notices.iter().filter(|n| matches!(n, Notice::Reconnecting { .. })).count();
    assert_eq!(failures, 4);
    assert_eq!(retries, 4);

    supervisor.shutdown_handle().shutdown();
    assert_eq!(runner.await.unwrap(), 5);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_active_link_and_starts_nothing_new() {
    let (connector, mut remotes) = MemoryConnector::new(0);
    let (display, _rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let sinks = Sinks {
        display: display.clone(),
        raw_log: Arc::new(MemoryLines::default()),
        amount_log: Arc::new(MemoryLines::default()),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), Arc::new(connector), sinks));
    let handle = supervisor.shutdown_handle();
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let mut remote = remotes.recv().await.expect("session");
    remote.next_sent().await.unwrap();
    remote.next_sent().await.unwrap();

    handle.shutdown();
    assert!(handle.is_shutdown());
    assert_eq!(runner.await.unwrap(), 1);

    assert_eq!(remote.next_sent().await, None);
    assert!(remotes.try_recv().is_err());
    assert!(display.notices().contains(&Notice::Closed { session: 1, reason: EndReason::Shutdown }));
}

#[tokio::test(start_paused = true)]
async fn amounts_and_raw_messages_reach_their_files() {
    let dir = tempdir().unwrap();
    let raw_path = dir.path().join("messages.log");
    let amount_path = dir.path().join("graph.log");

    let (connector, mut remotes) = MemoryConnector::new(0);
    let (display, mut rendered) = RecordingDisplay::new();
    let sinks = Sinks {
        display: Arc::new(display),
        raw_log: Arc::new(AppendLog::new(&raw_path)),
        amount_log: Arc::new(AppendLog::new(&amount_path)),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), Arc::new(connector), sinks));
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let remote = remotes.recv().await.expect("session");
    let frames = [
        fact("$1,234"),
        json!(["3", "3", "fact.abc.fact", "fact", {}]).to_string(),
        json!([null, null, "fact.abc.reward", "reward", {"amount": "$5"}]).to_string(),
        json!(["3", "3", "fact.abc.fact", "phx_reply", {"status": "ok"}]).to_string(),
        "[[[".to_string(),
        fact("$1,300.99"),
    ];
    for frame in &frames {
        remote.push(frame);
    }
    for _ in &frames {
        rendered.recv().await.unwrap();
    }

    supervisor.shutdown();
    runner.await.unwrap();

    let raw = std::fs::read_to_string(&raw_path).unwrap();
    let raw_lines: Vec<&str> = raw.lines().collect();
    assert_eq!(raw_lines.len(), frames.len());
    for (line, frame) in raw_lines.iter().zip(&frames) {
        assert!(line.starts_with('['));
        assert!(line.ends_with(&format!("] {}", frame)), "{line}");
    }

    let amounts = std::fs::read_to_string(&amount_path).unwrap();
    let amount_lines: Vec<&str> = amounts.lines().collect();
    assert_eq!(amount_lines.len(), 2);
    assert!(amount_lines[0].ends_with("] 1234"));
    assert!(amount_lines[1].ends_with("] 1300"));
}

#[tokio::test(start_paused = true)]
async fn silent_link_is_replaced_when_the_watchdog_is_enabled() {
    let (connector, mut remotes) = MemoryConnector::new(0);
    let (display, _rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let sinks = Sinks {
        display: display.clone(),
        raw_log: Arc::new(MemoryLines::default()),
        amount_log: Arc::new(MemoryLines::default()),
    };
    let config = FeedConfig {
        inactivity_timeout: Some(Duration::from_secs(45)),
        ..test_config()
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(config, Arc::new(connector), sinks));
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let _first = remotes.recv().await.expect("first session");
    let _second = remotes.recv().await.expect("watchdog reconnect");

    assert!(display.notices().contains(&Notice::Closed {
        session: 1,
        reason: EndReason::Error("inactivity timeout".to_string()),
    }));

    supervisor.shutdown();
    assert_eq!(runner.await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_on_a_joined_link_starts_a_new_session() {
    let (connector, mut remotes) = MemoryConnector::new(0);
    let connector = Arc::new(connector);
    let (display, _rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let sinks = Sinks {
        display: display.clone(),
        raw_log: Arc::new(MemoryLines::default()),
        amount_log: Arc::new(MemoryLines::default()),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), connector.clone(), sinks));
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let mut first = remotes.recv().await.expect("first session");
    assert!(first.next_sent().await.unwrap().contains("phx_join"));
    assert!(first.next_sent().await.unwrap().contains("phx_join"));

    first.fail("connection reset");
    let mut second = remotes.recv().await.expect("second session");
    assert_eq!(connector.attempts(), 2);
    assert!(second.next_sent().await.unwrap().contains("phx_join"));

    assert!(display.notices().contains(&Notice::Closed {
        session: 1,
        reason: EndReason::Error("connection reset".to_string()),
    }));

    // No heartbeat ever reaches the failed link.
    sleep(Duration::from_secs(120)).await;
    assert_eq!(first.next_sent().await, None);

    supervisor.shutdown();
    assert_eq!(runner.await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_raw_log_never_ends_the_session() {
    let (connector, mut remotes) = MemoryConnector::new(0);
    let connector = Arc::new(connector);
    let (display, mut rendered) = RecordingDisplay::new();
    let display = Arc::new(display);
    let amount_log = Arc::new(MemoryLines::default());
    let sinks = Sinks {
        display: display.clone(),
        raw_log: Arc::new(FailingLines),
        amount_log: amount_log.clone(),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(test_config(), connector.clone(), sinks));
    let runner = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    let mut remote = remotes.recv().await.expect("session");
    remote.next_sent().await.unwrap();
    remote.next_sent().await.unwrap();

    remote.push(&fact("$7"));
    assert_eq!(rendered.recv().await.unwrap().total_messages, 1);
    let amounts = amount_log.lines();
    assert_eq!(amounts.len(), 1);
    assert!(amounts[0].ends_with("] 7"), "{}", amounts[0]);

    // Still joined: the heartbeat keeps running and messages keep flowing.
    sleep(Duration::from_secs(31)).await;
    assert_eq!(remote.next_sent().await.unwrap(), HEARTBEAT);
    remote.push(&fact("$8"));
    assert_eq!(rendered.recv().await.unwrap().total_messages, 2);
    assert_eq!(amount_log.lines().len(), 2);

    let notices = display.notices();
    assert!(notices.contains(&Notice::HeartbeatSent));
    assert!(!notices.iter().any(|n| matches!(n, Notice::Closed { .. })));
    assert_eq!(connector.attempts(), 1);

    supervisor.shutdown();
    assert_eq!(runner.await.unwrap(), 1);
}
