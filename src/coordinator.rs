//! Update cycle
//!
//! [`update`] runs one tick against an explicitly owned [`CoordinatorState`]:
//! tracker decision, optional fetch, and the best-effort cost aggregates after
//! a new interval lands. [`Coordinator`] bundles the state with its source and
//! clock for hosts that just want to call `update()` on a timer.

use crate::aggregate::{CostAggregate, CostAggregator, CostTotals};
use crate::client::IntervalSource;
use crate::error::{LocalvoltsError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::reading::IntervalReading;
use crate::time::{Clock, SystemClock, format_time, to_rfc3339};
use crate::tracker::{IntervalTracker, TickAction};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Process-lifetime state, created empty and overwritten in place
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    tracker: IntervalTracker,
    costs: CostTotals,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> &IntervalTracker {
        &self.tracker
    }

    pub fn current_interval_end(&self) -> Option<DateTime<Utc>> {
        self.tracker.current_interval_end()
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.tracker.last_update_time()
    }

    pub fn time_past_interval_start(&self) -> TimeDelta {
        self.tracker.time_past_interval_start()
    }

    pub fn latest_reading(&self) -> Option<&IntervalReading> {
        self.tracker.latest_reading()
    }

    pub fn today_cost(&self) -> &CostAggregate {
        &self.costs.today
    }

    pub fn month_cost(&self) -> &CostAggregate {
        &self.costs.month
    }

    pub fn costs(&self) -> &CostTotals {
        &self.costs
    }
}

/// Run one tick at `now`
///
/// Errors from the interval fetch and a batch without a final reading are
/// returned unchanged. The cost aggregates are refreshed only when the
/// accepted interval differs from the one tracked before; their failures
/// never surface here and are kept in the state's cost entries. On a skipped
/// tick the stored reading is served again.
pub async fn update<S>(
    state: &mut CoordinatorState,
    now: DateTime<Utc>,
    source: &S,
) -> Result<IntervalReading>
where
    S: IntervalSource + ?Sized,
{
    let logger = get_logger("coordinator");

    let (from, to) = match state.tracker.poll(now) {
        TickAction::Unchanged => {
            logger.trace(&format!(
                "Still inside interval ending {}; elapsed {}s",
                state
                    .current_interval_end()
                    .map(|end| format_time(&end))
                    .unwrap_or_default(),
                state.time_past_interval_start().num_seconds()
            ));
            return state
                .latest_reading()
                .cloned()
                .ok_or_else(|| LocalvoltsError::no_final_data("no interval tracked yet"));
        }
        TickAction::Fetch { from, to } => (from, to),
    };

    let readings = source.fetch_intervals(from, to).await?;
    let previous_end = state.current_interval_end();
    let reading = state.tracker.accept(&readings).cloned().inspect_err(|e| {
        logger.warn(&format!(
            "No usable interval in {} .. {}: {}",
            format_time(&from),
            format_time(&to),
            e
        ));
    })?;

    let Some(tracked) = state.tracker.tracked() else {
        return Ok(reading);
    };
    if previous_end == Some(tracked.interval_end) {
        logger.debug(&format!(
            "Upstream still reports interval ending {}; aggregates left as is",
            format_time(&tracked.interval_end)
        ));
        return Ok(reading);
    }

    logger.info(&format!(
        "New final interval ending {} (updated {}, elapsed {}s)",
        format_time(&tracked.interval_end),
        format_time(&tracked.last_update),
        state.time_past_interval_start().num_seconds()
    ));

    CostAggregator::new()
        .refresh(source, now, &mut state.costs)
        .await;

    Ok(reading)
}

/// Read-only view handed to hosts and watchers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    /// False after a failed update until the next success
    pub available: bool,
    pub last_error: Option<String>,
    pub current_interval_end: Option<String>,
    pub last_update_time: Option<String>,
    pub time_past_interval_start_secs: i64,
    pub latest_reading: Option<IntervalReading>,
    pub today_cost: CostAggregate,
    pub month_cost: CostAggregate,
    pub total_updates: u64,
    pub failed_updates: u64,
}

/// State plus the collaborators needed to run it
pub struct Coordinator<S, C = SystemClock> {
    source: S,
    clock: C,
    state: CoordinatorState,
    last_error: Option<String>,
    total_updates: u64,
    failed_updates: u64,
    logger: StructuredLogger,
}

impl<S: IntervalSource> Coordinator<S, SystemClock> {
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock)
    }
}

impl<S, C> Coordinator<S, C>
where
    S: IntervalSource,
    C: Clock,
{
    pub fn with_clock(source: S, clock: C) -> Self {
        Self {
            source,
            clock,
            state: CoordinatorState::new(),
            last_error: None,
            total_updates: 0,
            failed_updates: 0,
            logger: get_logger("coordinator"),
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run one tick at the clock's current time
    pub async fn update(&mut self) -> Result<IntervalReading> {
        let now = self.clock.now();
        self.total_updates = self.total_updates.saturating_add(1);
        match update(&mut self.state, now, &self.source).await {
            Ok(reading) => {
                self.last_error = None;
                Ok(reading)
            }
            Err(e) => {
                self.failed_updates = self.failed_updates.saturating_add(1);
                self.logger.error(&format!("Update failed: {}", e));
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            available: self.last_error.is_none() && self.state.latest_reading().is_some(),
            last_error: self.last_error.clone(),
            current_interval_end: self.state.current_interval_end().map(|t| to_rfc3339(&t)),
            last_update_time: self.state.last_update_time().map(|t| to_rfc3339(&t)),
            time_past_interval_start_secs: self.state.time_past_interval_start().num_seconds(),
            latest_reading: self.state.latest_reading().cloned(),
            today_cost: self.state.today_cost().clone(),
            month_cost: self.state.month_cost().clone(),
            total_updates: self.total_updates,
            failed_updates: self.failed_updates,
        }
    }
}
