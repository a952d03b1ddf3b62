use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courtside_sync::transport::mock::{MockConnector, MockOutcome};
use courtside_sync::{
    Backoff, ConnectionState, Endpoint, Match, MatchStatus, SnapshotStore, Supervisor,
    SupervisorConfig, SyncEvent,
};
use serde_json::json;
use tokio::time::Instant;

fn exponential(max_attempts: u32) -> SupervisorConfig {
    SupervisorConfig::new(Endpoint::from_origin("https://scores.example.com").expect("origin"))
        .with_backoff(Backoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(4),
            jitter: false,
        })
        .with_max_reconnect_attempts(max_attempts)
}

#[test_timeout::tokio_timeout_test(10, paused)]
async fn exponential_backoff_keeps_the_attempt_cap() {
    let connector = Arc::new(MockConnector::new());
    let supervisor = Supervisor::spawn(exponential(4), connector.clone(), SnapshotStore::new());
    let mut status = supervisor.watch_status();

    let started = Instant::now();
    supervisor.connect();
    let reached = *status
        .wait_for(|s| s.state == ConnectionState::FailedPermanently)
        .await
        .expect("supervisor alive");

    // Waits of 1s, 2s, 4s and 4s between the five refused attempts.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(11), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(12), "{elapsed:?}");
    assert_eq!(reached.reconnect_attempts, 4);
    assert_eq!(connector.attempts(), 5);
    assert!(
        connector
            .urls()
            .iter()
            .all(|url| url == "wss://scores.example.com/api/ws/matches")
    );

    supervisor.shutdown().await;
}

#[test_timeout::tokio_timeout_test(10, paused)]
async fn observers_follow_updates_across_a_reconnect() {
    let store = SnapshotStore::new();
    let mut m1 = Match::new("m1", "Falcons", "Otters");
    m1.status = MatchStatus::Live;
    store.replace(vec![m1, Match::new("m2", "Herons", "Lynx")]);

    let seen: Arc<Mutex<Vec<(u32, usize)>>> = Arc::default();
    let notified = Arc::new(AtomicUsize::new(0));
    let _sub = {
        let seen = seen.clone();
        let notified = notified.clone();
        store.subscribe(move |snapshot| {
            notified.fetch_add(1, Ordering::SeqCst);
            let score = snapshot.get("m1").map_or(0, |m| m.score_a);
            seen.lock().unwrap().push((score, snapshot.live_count()));
        })
    };

    let connector = Arc::new(
        MockConnector::new().script([MockOutcome::Accept, MockOutcome::Accept]),
    );
    let supervisor = Supervisor::spawn(exponential(5), connector.clone(), store.clone());
    let mut events = supervisor.events();
    supervisor.connect();

    let first = connector.next_peer().await.expect("first link");
    first.push_json(&json!({
        "type": "match_state",
        "match_state": { "match_id": "m1", "score_a": 3, "changes": ["point_scored"] }
    }));
    first.fail("connection reset");

    // The retry waits one second of paused time, then opens the second link.
    let second = connector.next_peer().await.expect("second link");
    second.push_json(&json!({
        "type": "match_update",
        "match_id": "m2",
        "data": { "match_state": { "match_id": "m2", "status": "LIVE" } }
    }));
    second.push_json(&json!({
        "type": "match_update",
        "match_id": "ghost",
        "data": { "match_state": { "score_a": 9 } }
    }));
    second.push_json(&json!({
        "type": "match_state",
        "match_state": { "match_id": "m1", "score_a": 4 }
    }));

    let mut snapshots = store.watch();
    snapshots
        .wait_for(|s| s.get("m1").map(|m| m.score_a) == Some(4))
        .await
        .expect("store alive");

    assert_eq!(*seen.lock().unwrap(), vec![(3, 1), (3, 2), (4, 2)]);
    assert_eq!(notified.load(Ordering::SeqCst), 3);

    let mut opened = 0;
    while let Ok(event) = events.try_recv() {
        if event == SyncEvent::Connected(true) {
            opened += 1;
        }
    }
    assert_eq!(opened, 2);
    assert_eq!(supervisor.status().reconnect_attempts, 0);

    supervisor.shutdown().await;
}
