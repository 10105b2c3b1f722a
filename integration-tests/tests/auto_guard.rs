use std::time::Duration;

use guardwatch::types::EventKind;
use guardwatch::{MonitorSettings, PollOutcome};

use crate::common::{eventually, hosts, TestBackend};

fn settings(auto_guard: bool) -> MonitorSettings {
    MonitorSettings {
        refresh_interval: Duration::from_millis(200),
        auto_guard_enabled: auto_guard,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_auto_guard_starts_idle_nodes_only() {
    let backend = TestBackend::start(4, 2).await;
    let monitor = backend.monitor(settings(true));

    let outcome = monitor.load_nodes().await;
    assert_eq!(
        outcome,
        PollOutcome::Refreshed {
            auto_guarded: hosts(0..2)
        }
    );

    let nodes = monitor.nodes().await;
    assert_eq!(nodes.len(), 4);
    for node in nodes.iter() {
        let idle = node.hostname == "fake-node-0" || node.hostname == "fake-node-1";
        assert_eq!(node.guard_running, idle, "{}", node.hostname);
        assert_eq!(node.need_guard, idle, "{}", node.hostname);
    }

    let events = monitor.events().await;
    assert_eq!(events[0].kind, EventKind::Success);
    assert_eq!(
        events[0].message,
        "Auto-guard: now guarding fake-node-0, fake-node-1."
    );
    assert!(monitor.error().await.is_none());

    // Guarded nodes are no longer candidates.
    assert_eq!(
        monitor.load_nodes().await,
        PollOutcome::Refreshed {
            auto_guarded: vec![]
        }
    );
    assert_eq!(
        monitor.events().await[0].message,
        "Auto-guard: no nodes need guarding."
    );

    monitor.stop().await;
    backend.shutdown().await;
}

#[tokio::test]
async fn test_auto_guard_disabled_only_observes() {
    let backend = TestBackend::start(3, 3).await;
    let monitor = backend.monitor(settings(false));

    assert_eq!(
        monitor.load_nodes().await,
        PollOutcome::Refreshed {
            auto_guarded: vec![]
        }
    );

    let nodes = monitor.nodes().await;
    assert!(nodes.iter().all(|n| n.need_guard && !n.guard_running));
    assert_eq!(monitor.stats().await.need_guard_nodes, 3);

    let untouched = backend.client();
    let fresh = guardwatch::GuardApi::fetch_nodes(&untouched).await.unwrap();
    assert!(fresh.iter().all(|n| !n.guard_running));

    monitor.stop().await;
}

#[tokio::test]
async fn test_poller_guards_fleet_in_background() {
    let backend = TestBackend::start(3, 1).await;
    let monitor = backend.monitor(settings(true));
    let mut notifications = monitor.subscribe();

    assert!(monitor.start());
    assert!(!monitor.start());

    let guarded = eventually(Duration::from_secs(5), || {
        let monitor = monitor.clone();
        async move {
            monitor
                .nodes()
                .await
                .iter()
                .any(|n| n.hostname == "fake-node-0" && n.guard_running)
        }
    })
    .await;
    assert!(guarded, "poller never guarded the idle node");

    let first = tokio::time::timeout(Duration::from_secs(1), notifications.recv())
        .await
        .expect("no notification")
        .expect("notification channel closed");
    assert_eq!(first.title, "Auto-guard: starting");

    monitor.stop().await;
    assert!(monitor.is_stopped());
    assert_eq!(monitor.load_nodes().await, PollOutcome::Discarded);
}

#[tokio::test]
async fn test_concurrent_loads_collapse_into_one_rerun() {
    let backend = TestBackend::start(2, 0).await;
    let monitor = backend.monitor(settings(false));

    let outcomes = futures::future::join_all((0..4).map(|_| {
        let monitor = monitor.clone();
        async move { monitor.load_nodes().await }
    }))
    .await;

    let refreshed = outcomes
        .iter()
        .filter(|o| matches!(o, PollOutcome::Refreshed { .. }))
        .count();
    let queued = outcomes
        .iter()
        .filter(|o| **o == PollOutcome::Queued)
        .count();
    assert_eq!(refreshed, 1);
    assert_eq!(queued, 3);

    // The queued callers share a single follow-up pass.
    let passes = monitor
        .events()
        .await
        .iter()
        .filter(|e| e.message == "Node data refreshed.")
        .count();
    assert_eq!(passes, 2);

    monitor.stop().await;
}
