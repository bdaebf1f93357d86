use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time::Timestamp;
use crate::ApiClient;

use super::{decode, null_as_default};

pub struct Installations<'a> {
    client: &'a dyn ApiClient,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct InstallationsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub installations: Vec<Installation>,
}

/// Descriptive record of one installation on the account.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Installation {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    pub address: Option<String>,
    pub business: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub energy_class: Option<String>,
    pub grid_area: Option<String>,
    pub name: Option<String>,
    pub org_number: Option<String>,
    pub price_area: Option<String>,
    pub resolution: Option<String>,
    pub safety_level: Option<f32>,
    #[serde(deserialize_with = "null_as_default")]
    pub has_measurements_subscription: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_costs_subscription: bool,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct MeasurementSeriesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub installations: Vec<InstallationSeries>,
}

/// The measurement series available under one installation.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSeries {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub measurement_series: Vec<MeasurementSeries>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSeries {
    /// Key for [`Measurements::get`](super::measurements::Measurements::get).
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub series_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default)]
    pub last_update: Timestamp,
}

impl<'a> Installations<'a> {
    const URL: &'static str = "/installations";
    const SERIES_URL: &'static str = "/installations/measurement-series";

    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self { client }
    }

    /// Lists the installations on the account, optionally restricted to the
    /// given ids. A 204 reply is an empty list.
    pub fn list(&self, filter: &[String]) -> Result<InstallationsResponse> {
        let qs: Vec<(String, String)> = filter
            .iter()
            .map(|id| ("installationFilter".to_string(), id.clone()))
            .collect();

        match self.client.http_get(Installations::URL, &qs)? {
            Some(reply) => decode(Installations::URL, &qs, &reply),
            None => Ok(InstallationsResponse::default()),
        }
    }

    /// Lists the measurement series of every installation. A 204 reply is an
    /// empty list.
    pub fn measurement_series(&self) -> Result<MeasurementSeriesResponse> {
        match self.client.http_get(Installations::SERIES_URL, &[])? {
            Some(reply) => decode(Installations::SERIES_URL, &[], &reply),
            None => Ok(MeasurementSeriesResponse::default()),
        }
    }
}
