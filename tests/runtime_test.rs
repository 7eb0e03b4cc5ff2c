use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use localvolts::client::IntervalSource;
use localvolts::coordinator::Coordinator;
use localvolts::error::{LocalvoltsError, Result};
use localvolts::reading::{IntervalReading, Quality};
use localvolts::runtime::PollRuntime;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Fails the first primary request, then serves a final reading
struct FlakyOnce {
    requests: AtomicUsize,
}

#[async_trait]
impl IntervalSource for FlakyOnce {
    async fn fetch_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<IntervalReading>> {
        if self.requests.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(LocalvoltsError::rate_limited(429, 3));
        }
        let end = if to - from == TimeDelta::minutes(5) { to } else { from };
        Ok(vec![IntervalReading::new(
            Quality::Final,
            end,
            end,
            Some(json!(2)),
        )])
    }
}

#[tokio::test]
async fn run_recovers_after_failure_and_stops_on_shutdown() {
    let source = FlakyOnce {
        requests: AtomicUsize::new(0),
    };
    let runtime = PollRuntime::new(Coordinator::new(source), Duration::from_millis(10));
    let mut snapshots = runtime.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(runtime.run(shutdown_rx));

    let recovered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            snapshots.changed().await.unwrap();
            let snap = snapshots.borrow_and_update().clone();
            if snap.available {
                return snap;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(recovered.failed_updates, 1);
    assert!(recovered.last_error.is_none());
    assert!(recovered.latest_reading.is_some());
    assert_eq!(recovered.today_cost.value, Some(2.0));

    shutdown_tx.send(true).unwrap();
    let coordinator = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(coordinator.snapshot().total_updates >= 2);
}

#[tokio::test]
async fn dropping_shutdown_sender_stops_loop() {
    let source = FlakyOnce {
        requests: AtomicUsize::new(0),
    };
    let runtime = PollRuntime::new(Coordinator::new(source), Duration::from_millis(10));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(runtime.run(shutdown_rx));
    drop(shutdown_tx);

    assert!(
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .is_ok()
    );
}
