//! Fixed-width UTC timestamps (`2024-05-01T09:30:00.000000Z`).
//!
//! Every stored timestamp has the same width and precision, so string order
//! equals chronological order for anything reading the raw records.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current time truncated to the stored precision, so in-memory values
/// compare equal to what a later read returns.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Accepts RFC 3339 and offset-less ISO-8601 (treated as UTC).
pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|ts| ts.and_utc())
        })
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let fractional = whole + Duration::microseconds(7);
        assert_eq!(format(&whole), "2024-05-01T09:30:00.000000Z");
        assert_eq!(format(&fractional), "2024-05-01T09:30:00.000007Z");
        assert!(format(&whole) < format(&fractional));
    }

    #[test]
    fn test_parse_round_trips_now() {
        let ts = now();
        assert_eq!(parse(&format(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_parse_accepts_naive_iso() {
        let ts = parse("2024-05-01T09:30:00.123456").unwrap();
        assert_eq!(format(&ts), "2024-05-01T09:30:00.123456Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }
}
