//! Lenient timestamps as the Navigator API emits them.
//!
//! Date fields arrive as `null`, as an empty string, or as text in one of a
//! handful of formats that vary between endpoints. Every field decodes into
//! [`Timestamp`]; empty and null become [`Timestamp::ZERO`], which must be
//! read as "absent" rather than as an instant.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

type Parser = fn(&str) -> Option<DateTime<FixedOffset>>;

/// Accepted formats, tried in order. The first one that parses wins, so new
/// upstream variants go at the end.
const PARSERS: &[(&str, Parser)] = &[
    ("rfc3339", |s| DateTime::parse_from_rfc3339(s).ok()),
    ("local", |s| parse_local(s, "%Y-%m-%dT%H:%M:%S")),
    ("rfc3339-fractional", |s| {
        DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%:z").ok()
    }),
    ("local-fractional", |s| parse_local(s, "%Y-%m-%dT%H:%M:%S%.f")),
];

// Offset-less timestamps are taken as UTC.
fn parse_local(s: &str, fmt: &str) -> Option<DateTime<FixedOffset>> {
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// A possibly-absent instant, keeping the offset it was sent with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Timestamp(Option<DateTime<FixedOffset>>);

impl Timestamp {
    /// The "no value" sentinel.
    pub const ZERO: Timestamp = Timestamp(None);

    /// Parses `raw` against the accepted formats. Empty input is zero.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.is_empty() || raw == "null" {
            return Ok(Self::ZERO);
        }

        PARSERS
            .iter()
            .find_map(|(_, parse)| parse(raw))
            .map(|dt| Timestamp(Some(dt)))
            .ok_or_else(|| Error::MalformedTimestamp {
                raw: raw.to_string(),
            })
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<DateTime<FixedOffset>> {
        self.0
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        self.0.map(|dt| dt.with_timezone(&Utc))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(Some(dt.fixed_offset()))
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Timestamp(Some(dt))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => write!(f, "null"),
        }
    }
}

impl Serialize for Timestamp {
    // Second precision only: fractional seconds do not survive a round-trip.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(Timestamp::ZERO),
            Some(raw) => Timestamp::parse(&raw).map_err(serde::de::Error::custom),
        }
    }
}
