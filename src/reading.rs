//! Interval readings as returned by `/v1/customer/interval`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Settlement quality of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Estimate that may still change
    Provisional,
    /// Settled upstream; the only authoritative quality
    Final,
    #[default]
    Other,
}

impl Quality {
    /// Map a wire label, ignoring case
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "exp" | "final" => Self::Final,
            "fcst" | "forecast" | "provisional" => Self::Provisional,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisional => "provisional",
            Self::Final => "final",
            Self::Other => "other",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final)
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Quality {
    /// Never fails: a missing, null or non-string marker is `Other`
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Value::deserialize(deserializer)?;
        Ok(label.as_str().map_or(Self::Other, Self::from_label))
    }
}

/// One 5-minute slice
///
/// Decoding is lenient so one odd row never spoils a batch. Timestamps that
/// are absent or unparseable come through as `None`; only the reading picked
/// as the newest final interval must carry both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalReading {
    #[serde(default)]
    pub quality: Quality,

    /// Exclusive end of the slice
    #[serde(default, with = "crate::time::serde_utc")]
    pub interval_end: Option<DateTime<Utc>>,

    /// When upstream computed this reading
    #[serde(default, with = "crate::time::serde_utc")]
    pub last_update: Option<DateTime<Utc>>,

    /// Total cost in cents, as sent (number, numeric string, or junk)
    #[serde(
        default,
        rename = "costsAll",
        alias = "costAll",
        skip_serializing_if = "Option::is_none"
    )]
    pub costs_all: Option<Value>,

    /// Everything else the API sends, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IntervalReading {
    pub fn new(
        quality: Quality,
        interval_end: DateTime<Utc>,
        last_update: DateTime<Utc>,
        costs_all: Option<Value>,
    ) -> Self {
        Self {
            quality,
            interval_end: Some(interval_end),
            last_update: Some(last_update),
            costs_all,
            extra: Map::new(),
        }
    }

    /// Start of the slice, when the end is known
    pub fn interval_start(&self) -> Option<DateTime<Utc>> {
        self.interval_end
            .map(|end| end - crate::time::interval_length())
    }

    /// Cost in cents when it is a finite number or a numeric string
    pub fn cost(&self) -> Option<f64> {
        let value = match self.costs_all.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}
