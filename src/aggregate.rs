//! Day-to-date and month-to-date cost aggregates
//!
//! Aggregates are best effort: each one records its own value or error text
//! and nothing here can fail the primary update.

use crate::client::IntervalSource;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::quality::sum_cost;
use crate::time::{format_time, start_of_day, start_of_month};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One rolling total: a value, an error, or neither before the first run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostAggregate {
    /// Total in cents
    pub value: Option<f64>,
    pub error: Option<String>,
    #[serde(serialize_with = "serialize_opt_time")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CostAggregate {
    /// Record an outcome; a failure clears the previous value
    pub fn record(&mut self, outcome: Result<f64>, at: DateTime<Utc>) {
        match outcome {
            Ok(total) => {
                self.value = Some(total);
                self.error = None;
            }
            Err(e) => {
                self.value = None;
                self.error = Some(e.to_string());
            }
        }
        self.updated_at = Some(at);
    }

    pub fn is_ok(&self) -> bool {
        self.value.is_some() && self.error.is_none()
    }
}

/// Both aggregates as kept in the coordinator state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub today: CostAggregate,
    pub month: CostAggregate,
}

/// Issues the two windowed fetches and sums them
#[derive(Debug, Clone)]
pub struct CostAggregator {
    logger: StructuredLogger,
}

impl Default for CostAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostAggregator {
    pub fn new() -> Self {
        Self {
            logger: get_logger("aggregate"),
        }
    }

    /// Refresh both totals for `now`; failures land in the aggregate's error text
    pub async fn refresh<S>(&self, source: &S, now: DateTime<Utc>, totals: &mut CostTotals)
    where
        S: IntervalSource + ?Sized,
    {
        let (today, month) = tokio::join!(
            self.total(source, "today", Ok(start_of_day(now)), now),
            self.total(source, "month", start_of_month(now), now),
        );
        totals.today.record(today, now);
        totals.month.record(month, now);
    }

    async fn total<S>(
        &self,
        source: &S,
        label: &str,
        from: Result<DateTime<Utc>>,
        to: DateTime<Utc>,
    ) -> Result<f64>
    where
        S: IntervalSource + ?Sized,
    {
        let from = from?;
        match source.fetch_intervals(from, to).await {
            Ok(readings) => {
                let total = sum_cost(&readings);
                self.logger.debug(&format!(
                    "{} cost {:.2} over {} intervals ({} .. {})",
                    label,
                    total,
                    readings.len(),
                    format_time(&from),
                    format_time(&to)
                ));
                Ok(total)
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "Failed to fetch {} cost ({} .. {}): {}",
                    label,
                    format_time(&from),
                    format_time(&to),
                    e
                ));
                Err(e)
            }
        }
    }
}

fn serialize_opt_time<S: serde::Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(dt) => serializer.serialize_some(&crate::time::to_rfc3339(dt)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalvoltsError;
    use chrono::TimeZone;

    #[test]
    fn record_success_then_failure() {
        let at = Utc.with_ymd_and_hms(2023, 1, 15, 12, 0, 0).unwrap();
        let mut aggregate = CostAggregate::default();
        assert!(!aggregate.is_ok());

        aggregate.record(Ok(42.5), at);
        assert_eq!(aggregate.value, Some(42.5));
        assert!(aggregate.is_ok());

        aggregate.record(Err(LocalvoltsError::rate_limited(503, 3)), at);
        assert_eq!(aggregate.value, None);
        assert!(aggregate.error.as_deref().is_some_and(|e| e.contains("503")));
        assert_eq!(aggregate.updated_at, Some(at));
    }

    #[test]
    fn serializes_timestamp_as_rfc3339() {
        let at = Utc.with_ymd_and_hms(2023, 1, 15, 12, 0, 0).unwrap();
        let mut aggregate = CostAggregate::default();
        aggregate.record(Ok(1.0), at);
        let value = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(value["updated_at"], "2023-01-15T12:00:00Z");
        assert_eq!(value["error"], serde_json::Value::Null);
    }
}
