use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time::Timestamp;
use crate::ApiClient;

use super::{decode, null_as_default, DateRange, FormatToApiFmt};

pub struct Measurements<'a> {
    client: &'a dyn ApiClient,
}

/// Granularity of a measurement series.
///
/// `Quarter` and `Hour` need a bounded range upstream (at most 3 months and
/// 1 year respectively). The limits are left to the server to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 15-minute intervals
    Quarter,
    Hour,
    Day,
    Month,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = match self {
            Resolution::Quarter => "quarter",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
            Resolution::Month => "month",
        };
        write!(f, "{}", r)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quarter" => Ok(Resolution::Quarter),
            "hour" => Ok(Resolution::Hour),
            "day" => Ok(Resolution::Day),
            "month" => Ok(Resolution::Month),
            other => Err(format!(
                "unknown resolution '{other}', expected quarter, hour, day or month"
            )),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct MeasurementsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolution: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub measurements: Vec<Measurement>,
}

/// One reading. `value` is `None` for a gap the server did not fill.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Measurement {
    #[serde(rename = "timeStamp", default)]
    pub timestamp: Timestamp,
    pub value: Option<f64>,
}

impl<'a> Measurements<'a> {
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the values of one series at the given resolution.
    ///
    /// `include_missing` asks the server to fill gaps with null values.
    /// A 204 reply is an empty list.
    pub fn get(
        &self,
        series_id: i64,
        resolution: Resolution,
        range: DateRange,
        include_missing: bool,
    ) -> Result<MeasurementsResponse> {
        let path = format!("/measurements/{}/resolution/{}", series_id, resolution);

        let mut qs = range.to_query_string(FormatToApiFmt::to_api_format_millis);
        qs.push(("includeMissing".to_string(), include_missing.to_string()));

        match self.client.http_get(&path, &qs)? {
            Some(reply) => decode(&path, &qs, &reply),
            None => Ok(MeasurementsResponse::default()),
        }
    }
}

impl MeasurementsResponse {
    /// A `timestamp` / `value` frame. Absent timestamps and gaps become nulls.
    pub fn as_polars_df(&self) -> Result<polars::prelude::DataFrame, anyhow::Error> {
        let mut timestamps: Vec<Option<NaiveDateTime>> = vec![];
        let mut values: Vec<Option<f64>> = vec![];

        for m in &self.measurements {
            timestamps.push(m.timestamp.to_utc().map(|dt| dt.naive_utc()));
            values.push(m.value);
        }

        let df = DataFrame::new(vec![
            Series::new("timestamp".into(), timestamps),
            Series::new("value".into(), values),
        ])?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_wire_words() {
        for (res, word) in [
            (Resolution::Quarter, "quarter"),
            (Resolution::Hour, "hour"),
            (Resolution::Day, "day"),
            (Resolution::Month, "month"),
        ] {
            assert_eq!(res.to_string(), word);
            assert_eq!(word.parse::<Resolution>().unwrap(), res);
        }
        assert_eq!("HOUR".parse::<Resolution>().unwrap(), Resolution::Hour);
        assert!("minute".parse::<Resolution>().is_err());
    }

    #[test]
    fn null_values_are_kept_as_gaps() {
        let json = r#"{
            "id": 12345,
            "resolution": "hour",
            "measurements": [
                {"timeStamp": "2024-01-01T00:00:00Z", "value": 1.5},
                {"timeStamp": "2024-01-01T01:00:00Z", "value": null},
                {"timeStamp": "2024-01-01T02:00:00", "value": 2.25}
            ]
        }"#;

        let response: MeasurementsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, 12345);
        assert_eq!(response.measurements.len(), 3);
        assert_eq!(response.measurements[0].value, Some(1.5));
        assert_eq!(response.measurements[1].value, None);

        let df = response.as_polars_df().unwrap();
        assert_eq!(df.shape(), (3, 2));
        assert_eq!(df.column("value").unwrap().null_count(), 1);
        assert_eq!(df.column("timestamp").unwrap().null_count(), 0);
    }

    #[test]
    fn null_envelope_fields_decode_as_zero_values() {
        let json = r#"{"id": null, "resolution": null, "measurements": null}"#;
        let response: MeasurementsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response, MeasurementsResponse::default());
    }
}
