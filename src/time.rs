//! Time helpers for the metering API
//!
//! The API speaks UTC with a literal `Z` suffix and second precision. Upstream
//! timestamps occasionally arrive without an offset; those are taken as UTC.

use crate::error::{LocalvoltsError, Result};
use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc,
};

/// Length of one metering interval in minutes
pub const INTERVAL_MINUTES: i64 = 5;

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Length of one metering interval
pub fn interval_length() -> TimeDelta {
    TimeDelta::minutes(INTERVAL_MINUTES)
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Format an aware timestamp the way the API expects (UTC, `Z` suffix)
pub fn format_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc).format(WIRE_FORMAT).to_string()
}

/// Format a naive timestamp, assuming it is already UTC
pub fn format_naive_time(dt: &NaiveDateTime) -> String {
    format_time(&dt.and_utc())
}

/// Parse an upstream timestamp: RFC 3339 with offset, or naive ISO-8601 as UTC
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))?;
    Ok(naive.and_utc())
}

/// Render a timestamp for snapshots and re-serialized readings
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Midnight UTC of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Midnight UTC of the first day of the month containing `now`
pub fn start_of_month(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .ok_or_else(|| {
            LocalvoltsError::validation(
                "datetime".to_string(),
                format!("no first day of month for {}", to_rfc3339(&now)),
            )
        })
}

/// `max(0, later - earlier)`
pub fn clamped_elapsed(earlier: DateTime<Utc>, later: DateTime<Utc>) -> TimeDelta {
    (later - earlier).max(TimeDelta::zero())
}

/// Serde adapter for optional UTC timestamps
///
/// Anything that is not a parseable string (null, numbers, junk text)
/// deserializes to `None`; callers that need the timestamp check for it.
pub mod serde_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_str(&super::to_rfc3339(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(|s| super::parse_time(s).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    #[test]
    fn format_time_converts_to_utc() {
        let naive = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_naive_time(&naive), "2023-01-01T12:00:00Z");

        let aest = FixedOffset::east_opt(10 * 3600).unwrap();
        let aware = aest.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).single().unwrap();
        assert_eq!(format_time(&aware), "2023-01-01T02:00:00Z");
    }

    #[test]
    fn format_time_drops_subseconds() {
        let dt = utc(2023, 6, 30, 23, 59, 59) + TimeDelta::milliseconds(750);
        assert_eq!(format_time(&dt), "2023-06-30T23:59:59Z");
    }

    #[test]
    fn parse_time_accepts_offsets_and_naive() {
        assert_eq!(
            parse_time("2023-01-01T10:05:00+10:00").unwrap(),
            utc(2023, 1, 1, 0, 5, 0)
        );
        assert_eq!(parse_time("2023-01-01T00:05:00Z").unwrap(), utc(2023, 1, 1, 0, 5, 0));
        assert_eq!(parse_time("2023-01-01T00:05:00").unwrap(), utc(2023, 1, 1, 0, 5, 0));
        assert_eq!(
            parse_time("2023-01-01T00:05:00.123").unwrap(),
            utc(2023, 1, 1, 0, 5, 0) + TimeDelta::milliseconds(123)
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn day_and_month_starts() {
        let now = utc(2024, 2, 29, 17, 42, 9) + TimeDelta::milliseconds(500);
        assert_eq!(start_of_day(now), utc(2024, 2, 29, 0, 0, 0));
        assert_eq!(start_of_month(now).unwrap(), utc(2024, 2, 1, 0, 0, 0));
    }

    #[test]
    fn elapsed_is_clamped() {
        let a = utc(2023, 1, 1, 0, 0, 0);
        let b = utc(2023, 1, 1, 0, 2, 0);
        assert_eq!(clamped_elapsed(a, b), TimeDelta::minutes(2));
        assert_eq!(clamped_elapsed(b, a), TimeDelta::zero());
    }

    #[test]
    fn closures_are_clocks() {
        let fixed = utc(2023, 1, 1, 0, 0, 0);
        let clock = move || fixed;
        assert_eq!(Clock::now(&clock), fixed);
    }
}
