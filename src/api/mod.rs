use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::Error;

pub mod costs;
pub mod installations;
pub mod measurements;

pub trait FormatToApiFmt {
    /// RFC 3339 with second precision, as the costs endpoint expects it.
    fn to_api_format(&self) -> String;

    /// Millisecond precision with a literal `Z`, as the measurements endpoint expects it.
    fn to_api_format_millis(&self) -> String;
}

impl FormatToApiFmt for DateTime<Utc> {
    fn to_api_format(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn to_api_format_millis(&self) -> String {
        self.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

/// An optionally bounded time range. Either end may be left open; the
/// corresponding query parameter is then omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn unbounded() -> Self {
        DateRange::default()
    }

    fn to_query_string(&self, format: fn(&DateTime<Utc>) -> String) -> Vec<(String, String)> {
        let mut qs = vec![];
        if let Some(from) = &self.from {
            qs.push(("from".to_string(), format(from)));
        }
        if let Some(to) = &self.to {
            qs.push(("to".to_string(), format(to)));
        }
        qs
    }
}

/// Reads `null` as the field type's default. Upstream sends `null` for
/// plain strings, numbers and flags it has no value for.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Decodes a 200 body, keeping the raw text on failure.
pub(crate) fn decode<T: DeserializeOwned>(
    path: &str,
    qs: &[(String, String)],
    reply: &str,
) -> Result<T, Error> {
    serde_json::from_str(reply).map_err(|e| {
        warn!(path, ?qs, error = %e, "failed to parse response");
        Error::decode(&e, reply)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn api_formats() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(dt.to_api_format(), "2024-01-01T00:00:00Z");
        assert_eq!(dt.to_api_format_millis(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn open_ends_are_omitted() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let range = DateRange {
            from: Some(from),
            to: None,
        };
        assert_eq!(
            range.to_query_string(FormatToApiFmt::to_api_format),
            vec![("from".to_string(), "2024-03-01T00:00:00Z".to_string())]
        );
        assert!(DateRange::unbounded()
            .to_query_string(FormatToApiFmt::to_api_format)
            .is_empty());
    }
}
