//! Interval state tracker
//!
//! Decides on every tick whether a new finalized interval may be available
//! and keeps the elapsed-into-interval duration moving between fetches.

use crate::error::{LocalvoltsError, Result};
use crate::quality::select_final;
use crate::reading::IntervalReading;
use crate::time::{clamped_elapsed, interval_length};
use chrono::{DateTime, TimeDelta, Utc};

/// Interval currently believed to be the newest finalized one
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedInterval {
    pub interval_end: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub reading: IntervalReading,
}

impl TrackedInterval {
    pub fn interval_start(&self) -> DateTime<Utc> {
        self.interval_end - interval_length()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackerState {
    #[default]
    NoData,
    Tracking(TrackedInterval),
}

/// What a tick asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Fetch `[from, to)` and hand the result to [`IntervalTracker::accept`]
    Fetch {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Still inside the tracked interval; nothing to fetch
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct IntervalTracker {
    state: TrackerState,
    time_past_interval_start: TimeDelta,
}

impl Default for IntervalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::NoData,
            time_past_interval_start: TimeDelta::zero(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn tracked(&self) -> Option<&TrackedInterval> {
        match &self.state {
            TrackerState::Tracking(tracked) => Some(tracked),
            TrackerState::NoData => None,
        }
    }

    pub fn current_interval_end(&self) -> Option<DateTime<Utc>> {
        self.tracked().map(|t| t.interval_end)
    }

    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.tracked().map(|t| t.last_update)
    }

    pub fn latest_reading(&self) -> Option<&IntervalReading> {
        self.tracked().map(|t| &t.reading)
    }

    pub fn time_past_interval_start(&self) -> TimeDelta {
        self.time_past_interval_start
    }

    /// Whether `now` has moved past the tracked interval (or nothing is tracked)
    pub fn needs_fetch(&self, now: DateTime<Utc>) -> bool {
        self.current_interval_end().is_none_or(|end| now > end)
    }

    /// Decide the tick; on `Unchanged` the elapsed time is advanced to `now`
    pub fn poll(&mut self, now: DateTime<Utc>) -> TickAction {
        if self.needs_fetch(now) {
            return TickAction::Fetch {
                from: now,
                to: now + interval_length(),
            };
        }
        if let Some(start) = self.tracked().map(TrackedInterval::interval_start) {
            self.time_past_interval_start = clamped_elapsed(start, now);
        }
        TickAction::Unchanged
    }

    /// Take the first finalized reading of a fetched batch
    ///
    /// Without one, the elapsed time drops to zero and the previously tracked
    /// interval stays in place (stale) so the host can keep showing it. A final
    /// reading lacking either timestamp is malformed and changes nothing.
    pub fn accept<'a>(&mut self, readings: &'a [IntervalReading]) -> Result<&'a IntervalReading> {
        let Some(reading) = select_final(readings) else {
            self.time_past_interval_start = TimeDelta::zero();
            return Err(LocalvoltsError::no_final_data(format!(
                "none of {} returned intervals is final",
                readings.len()
            )));
        };
        let (Some(interval_end), Some(last_update)) = (reading.interval_end, reading.last_update)
        else {
            return Err(LocalvoltsError::malformed(
                "final interval without a valid intervalEnd and lastUpdate",
            ));
        };

        let tracked = TrackedInterval {
            interval_end,
            last_update,
            reading: reading.clone(),
        };
        self.time_past_interval_start =
            clamped_elapsed(tracked.interval_start(), tracked.last_update);
        self.state = TrackerState::Tracking(tracked);
        Ok(reading)
    }
}
