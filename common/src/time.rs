//! Time utilities and constants for ValutaTrade.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};

/// Engine timing defaults.
pub mod constants {
    use super::Duration;

    /// Default cache time-to-live (1 hour).
    pub fn default_rates_ttl() -> Duration {
        Duration::seconds(3600)
    }

    /// Default background refresh interval (1 hour).
    pub fn default_refresh_interval() -> Duration {
        Duration::seconds(3600)
    }

    /// Floor for the background refresh interval (60 seconds).
    pub fn min_refresh_interval() -> Duration {
        Duration::seconds(60)
    }

    /// Per-request HTTP timeout for rate sources (10 seconds).
    pub fn request_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp as ISO-8601 with a `Z` suffix.
pub fn format_iso(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO-8601 timestamp.
///
/// Values without an offset are read as UTC. Returns `None` for anything else.
pub fn parse_iso(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Check whether `timestamp` is more than `ttl` behind `now`.
pub fn is_older_than(timestamp: Timestamp, now: Timestamp, ttl: Duration) -> bool {
    now.signed_duration_since(timestamp) > ttl
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Serde adapter for optional timestamps that tolerates garbage.
///
/// A value that is missing, `null`, not a string, or not a parsable timestamp
/// deserialises as `None`. Serialisation always writes ISO-8601.
pub mod lenient_timestamp {
    use super::{format_iso, parse_iso, Timestamp};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&format_iso(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(parse_iso))
    }
}

/// Serde adapter writing timestamps in the same ISO-8601 shape as `format_iso`.
pub mod iso_timestamp {
    use super::{format_iso, parse_iso, Timestamp};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_iso(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_iso(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_iso_uses_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_iso(&ts), "2025-01-02T03:04:05.000000Z");
    }

    #[test]
    fn test_parse_iso_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_iso("2025-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_iso("2025-01-02T03:04:05+00:00"), Some(expected));
        assert_eq!(parse_iso("2025-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_iso("yesterday"), None);
    }

    #[test]
    fn test_is_older_than() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ttl = Duration::seconds(3600);

        assert!(!is_older_than(t0, t0 + Duration::seconds(1800), ttl));
        assert!(!is_older_than(t0, t0 + ttl, ttl));
        assert!(is_older_than(t0, t0 + Duration::seconds(7200), ttl));
    }

    #[test]
    fn test_lenient_timestamp_ignores_garbage() {
        #[derive(serde::Deserialize)]
        struct Holder {
            #[serde(default, with = "lenient_timestamp")]
            at: Option<Timestamp>,
        }

        let ok: Holder = serde_json::from_str(r#"{"at":"2025-01-02T03:04:05Z"}"#).unwrap();
        assert!(ok.at.is_some());

        let garbage: Holder = serde_json::from_str(r#"{"at":"not a date"}"#).unwrap();
        assert!(garbage.at.is_none());

        let number: Holder = serde_json::from_str(r#"{"at":42}"#).unwrap();
        assert!(number.at.is_none());

        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert!(missing.at.is_none());
    }
}
