//! Polling loop for running the coordinator as a standalone service

use crate::client::IntervalSource;
use crate::coordinator::{Coordinator, CoordinatorSnapshot};
use crate::logging::{StructuredLogger, get_logger};
use crate::time::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Drives a [`Coordinator`] on a fixed period, one update at a time
pub struct PollRuntime<S, C> {
    coordinator: Coordinator<S, C>,
    poll_interval: Duration,
    snapshot_tx: watch::Sender<Arc<CoordinatorSnapshot>>,
    overrun_count: u64,
    logger: StructuredLogger,
}

impl<S, C> PollRuntime<S, C>
where
    S: IntervalSource,
    C: Clock,
{
    pub fn new(coordinator: Coordinator<S, C>, poll_interval: Duration) -> Self {
        let initial = Arc::new(coordinator.snapshot());
        let (snapshot_tx, _) = watch::channel(initial);
        Self {
            coordinator,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            snapshot_tx,
            overrun_count: 0,
            logger: get_logger("runtime"),
        }
    }

    /// Receive a fresh snapshot after every tick
    pub fn subscribe(&self) -> watch::Receiver<Arc<CoordinatorSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn coordinator(&self) -> &Coordinator<S, C> {
        &self.coordinator
    }

    /// Ticks whose update took longer than the poll interval
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Run one update and publish the resulting snapshot
    pub async fn tick(&mut self) {
        let started = Instant::now();
        // Failures are logged by the coordinator and show up in the snapshot
        let _ = self.coordinator.update().await;
        let elapsed = started.elapsed();
        if elapsed > self.poll_interval {
            self.overrun_count = self.overrun_count.saturating_add(1);
            self.logger.warn(&format!(
                "Update took {:?}, longer than the {:?} poll interval",
                elapsed, self.poll_interval
            ));
        }
        self.snapshot_tx
            .send_replace(Arc::new(self.coordinator.snapshot()));
    }

    /// Poll until `shutdown` turns true or its sender is dropped
    ///
    /// Ticks never overlap; a slow update delays the next tick instead of
    /// queueing a burst. The coordinator is handed back on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Coordinator<S, C> {
        self.logger
            .info(&format!("Polling every {:?}", self.poll_interval));
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        let last = self.coordinator.snapshot();
        self.logger.info(&format!(
            "Shutdown signal received after {} updates ({} failed)",
            last.total_updates, last.failed_updates
        ));
        self.coordinator
    }
}

/// Turn a termination signal into a shutdown request
///
/// Only a delivered signal stops the runtime. If the listener cannot be
/// installed the error is logged and `shutdown` stays open, so the service
/// keeps polling until it is killed.
pub async fn forward_shutdown<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    let logger = get_logger("runtime");
    match signal.await {
        Ok(()) => {
            logger.info("Termination signal received, stopping");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            logger.error(&format!(
                "Failed to listen for termination signal, polling until killed: {}",
                e
            ));
            std::future::pending::<()>().await;
        }
    }
}
