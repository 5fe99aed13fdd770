//! Property values attached to files, groups, and channels.
//!
//! Properties are scalar metadata: numbers, strings, booleans, or
//! timestamps. Integer and floating point types of every width are widened
//! into the three numeric variants, so callers never have to care whether
//! the writer stored an `i16` or an `i64`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Seconds between the TDMS epoch (1904-01-01 UTC) and the Unix epoch.
const TDMS_EPOCH_OFFSET_SECS: i64 = 2_082_844_800;

/// Property map keyed by name. Ordered so reports are deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Any signed integer type.
    Int(i64),
    /// Any unsigned integer type.
    UInt(u64),
    /// Single or double precision float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Absolute timestamp.
    Timestamp(Timestamp),
}

impl PropertyValue {
    /// Returns the value as `f64` when it is numeric.
    #[allow(clippy::cast_precision_loss)] // Integer properties are metadata, not samples
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice when it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Timestamp(t) => write!(f, "{t}"),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Timestamp> for PropertyValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

/// An absolute point in time as stored in TDMS files.
///
/// Whole seconds since 1904-01-01 00:00:00 UTC plus a positive fraction of
/// a second in units of 2^-64 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Whole seconds since the TDMS epoch.
    pub seconds: i64,
    /// Fractional second, in 2^-64 s units.
    pub fractions: u64,
}

impl Timestamp {
    /// Builds a timestamp from whole seconds since the Unix epoch.
    ///
    /// Saturates at the ends of the representable range.
    pub fn from_unix_seconds(seconds: i64) -> Self {
        Self {
            seconds: seconds.saturating_add(TDMS_EPOCH_OFFSET_SECS),
            fractions: 0,
        }
    }

    /// Whole seconds since the Unix epoch, if representable.
    pub fn unix_seconds(&self) -> Option<i64> {
        self.seconds.checked_sub(TDMS_EPOCH_OFFSET_SECS)
    }

    /// Fractional second truncated to nanoseconds.
    #[allow(clippy::cast_possible_truncation)] // Result is < 1_000_000_000
    pub fn subsec_nanos(&self) -> u32 {
        ((u128::from(self.fractions) * 1_000_000_000) >> 64) as u32
    }

    /// Converts to a UTC date-time.
    ///
    /// Returns `None` when the instant lies outside the range `chrono` can
    /// represent.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.unix_seconds()?, self.subsec_nanos())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    #[allow(clippy::cast_possible_truncation)] // Quotient is below 2^64
    fn from(value: DateTime<Utc>) -> Self {
        let nanos = u128::from(value.timestamp_subsec_nanos());
        Self {
            seconds: value.timestamp().saturating_add(TDMS_EPOCH_OFFSET_SECS),
            // Round up so converting back truncates to the same nanosecond.
            fractions: (((nanos << 64) + 999_999_999) / 1_000_000_000) as u64,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
            None => write!(
                f,
                "{}s+{}/2^64s after 1904-01-01T00:00:00Z",
                self.seconds, self.fractions
            ),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(PropertyValue::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(PropertyValue::UInt(7).as_f64(), Some(7.0));
        assert_eq!(PropertyValue::Float(1e-6).as_f64(), Some(1e-6));
        assert_eq!(PropertyValue::from("x").as_f64(), None);
        assert_eq!(PropertyValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_timestamp_display() {
        let epoch = Timestamp::from_unix_seconds(0);
        assert_eq!(epoch.to_string(), "1970-01-01T00:00:00.000000Z");

        // 2025-11-21T17:30:18Z plus half a second
        let ts = Timestamp {
            seconds: 1_763_746_218 + TDMS_EPOCH_OFFSET_SECS,
            fractions: 1 << 63,
        };
        assert_eq!(ts.to_string(), "2025-11-21T17:30:18.500000Z");
    }

    #[test]
    fn test_timestamp_before_unix_epoch() {
        let tdms_epoch = Timestamp {
            seconds: 0,
            fractions: 0,
        };
        assert_eq!(tdms_epoch.to_string(), "1904-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_timestamp_outside_calendar_range() {
        for seconds in [i64::MIN, i64::MAX] {
            let ts = Timestamp {
                seconds,
                fractions: 0,
            };
            assert_eq!(ts.to_datetime(), None);
            assert_eq!(
                ts.to_string(),
                format!("{seconds}s+0/2^64s after 1904-01-01T00:00:00Z")
            );
        }
        assert_eq!(
            Timestamp {
                seconds: i64::MIN,
                fractions: 0
            }
            .unix_seconds(),
            None
        );
    }

    #[test]
    fn test_datetime_conversion() {
        let datetime = DateTime::<Utc>::from_timestamp(1_763_746_218, 250_000_000).unwrap();
        let ts = Timestamp::from(datetime);
        assert_eq!(ts.unix_seconds(), Some(1_763_746_218));
        assert_eq!(ts.to_datetime(), Some(datetime));
        assert_eq!(ts.to_string(), "2025-11-21T17:30:18.250000Z");
    }

    #[test]
    fn test_display_quotes_strings() {
        assert_eq!(PropertyValue::from("Volts").to_string(), "'Volts'");
        assert_eq!(PropertyValue::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_serialize_untagged() {
        let mut props = Properties::new();
        props.insert("wf_increment".to_string(), PropertyValue::Float(0.25));
        props.insert("unit".to_string(), PropertyValue::from("V"));
        props.insert(
            "start".to_string(),
            PropertyValue::Timestamp(Timestamp::from_unix_seconds(0)),
        );
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["wf_increment"], 0.25);
        assert_eq!(json["unit"], "V");
        assert_eq!(json["start"], "1970-01-01T00:00:00.000000Z");
    }
}
