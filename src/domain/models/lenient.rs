//! Forgiving deserializers for documents written by older tooling.
//!
//! Knowledge files and inbox entries have been produced by several writers
//! over time. Timestamps show up as RFC 3339, as naive ISO strings with
//! fractional seconds, or space separated. Optional fields are sometimes
//! written as explicit nulls.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse any timestamp shape we have seen on disk. Naive values are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// `deserialize_with` for timestamps. Null or missing becomes the epoch.
pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(DateTime::<Utc>::default()),
        Some(raw) => parse_timestamp(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized timestamp '{raw}'"))
        }),
    }
}

/// `deserialize_with` that maps an explicit null to `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[derive(Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "timestamp")]
        at: DateTime<Utc>,
        #[serde(default, deserialize_with = "null_as_default")]
        flag: bool,
    }

    #[test]
    fn test_rfc3339_keeps_offset() {
        let parsed = parse_timestamp("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.hour(), 8);
    }

    #[test]
    fn test_naive_iso_with_fraction_is_utc() {
        let parsed = parse_timestamp("2024-03-01T10:15:30.123456").unwrap();
        assert_eq!((parsed.day(), parsed.hour(), parsed.minute()), (1, 10, 15));
        assert_eq!(parsed.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_space_separated() {
        let parsed = parse_timestamp("2024-03-01 10:15:30").unwrap();
        assert_eq!(parsed.second(), 30);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(serde_json::from_str::<Stamped>(r#"{"at": "yesterday"}"#).is_err());
    }

    #[test]
    fn test_nulls_and_missing_fall_back() {
        let s: Stamped = serde_json::from_str(r#"{"at": null, "flag": null}"#).unwrap();
        assert_eq!(s.at, DateTime::<Utc>::default());
        assert!(!s.flag);

        let s: Stamped = serde_json::from_str("{}").unwrap();
        assert_eq!(s.at.year(), 1970);
    }
}
