// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable date used in notification messages (`dd.MM.yyyy HH:mm`).
pub fn format_display(date: DateTime<Utc>) -> String {
    date.format("%d.%m.%Y %H:%M").to_string()
}

/// Parse a timestamp from hh.ru, which uses `+0300` style offsets, falling
/// back to RFC3339 and then to a naive UTC timestamp.
pub fn parse_upstream_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter storing timestamps as second-precision RFC3339 with a `Z`
/// suffix. Fixed width keeps string ordering in Firestore chronological.
pub mod rfc3339_secs {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => s.serialize_some(&super::super::format_utc_rfc3339(*d)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_hh_offset() {
        let dt = parse_upstream_timestamp("2024-03-01T12:30:00+0300").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339_and_naive() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(
            parse_upstream_timestamp("2024-03-01T12:30:00+03:00"),
            Some(expected)
        );
        assert_eq!(
            parse_upstream_timestamp("2024-03-01T09:30:00"),
            Some(expected)
        );
        assert_eq!(parse_upstream_timestamp("yesterday"), None);
    }

    #[test]
    fn test_format_display() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 5, 7, 3, 0).unwrap();
        assert_eq!(format_display(dt), "05.01.2024 07:03");
        assert_eq!(format_utc_rfc3339(dt), "2024-01-05T07:03:00Z");
    }
}
