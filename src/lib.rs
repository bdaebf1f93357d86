use std::time::Duration;

use oauth2::{AccessToken, ClientId, ClientSecret};
use tracing::{debug, warn};

pub mod api;
pub mod auth;
pub mod error;
pub mod time;

use api::costs::{CostStatement, Costs};
use api::installations::{Installations, InstallationsResponse, MeasurementSeriesResponse};
use api::measurements::{Measurements, MeasurementsResponse, Resolution};
use api::DateRange;
use auth::TokenManager;
pub use error::{ApiErrorKind, Error, Result};

const PRODUCTION_BASE_URL: &str = "https://navigator-api.eon.se/api";

pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";

/// Authenticated transport the endpoint wrappers in [`api`] are built on.
pub trait ApiClient {
    /// GETs `path` below the base URL with a bearer token.
    ///
    /// Returns `None` for a 204 so each endpoint can decide what an empty
    /// reply means, the body for a 200, and [`Error::Api`] for anything else.
    fn http_get(&self, path: &str, query_string: &[(String, String)]) -> Result<Option<String>>;
}

/// Everything a caller can do with the Navigator API.
pub trait Navigator {
    fn access_token(&self) -> Result<AccessToken>;

    fn installations(&self, filter: &[String]) -> Result<InstallationsResponse>;

    fn measurement_series(&self) -> Result<MeasurementSeriesResponse>;

    fn measurements(
        &self,
        series_id: i64,
        resolution: Resolution,
        range: DateRange,
        include_missing: bool,
    ) -> Result<MeasurementsResponse>;

    fn costs(&self, installation_id: &str, range: DateRange) -> Result<CostStatement>;

    /// True when the API answered at all, whatever the status.
    fn is_alive(&self) -> bool;
}

/// Blocking client for the E.ON Energy Navigator API.
///
/// Safe to share between threads; the bearer token is fetched on first use
/// and refreshed shortly before it expires.
#[derive(Debug)]
pub struct EonApi {
    tokens: TokenManager,
    base_url: String,
    timeout: Option<Duration>,
    http: reqwest::blocking::Client,
}

impl EonApi {
    pub fn new(client_id: String, client_secret: String) -> Self {
        EonApi {
            tokens: TokenManager::new(ClientId::new(client_id), ClientSecret::new(client_secret)),
            base_url: PRODUCTION_BASE_URL.to_string(),
            timeout: None,
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Reads the credentials from `CLIENT_ID` and `CLIENT_SECRET`.
    pub fn from_env_values() -> Result<Self> {
        let client_id =
            std::env::var(CLIENT_ID_VAR).map_err(|_| Error::MissingCredentials(CLIENT_ID_VAR))?;
        let client_secret = std::env::var(CLIENT_SECRET_VAR)
            .map_err(|_| Error::MissingCredentials(CLIENT_SECRET_VAR))?;

        Ok(EonApi::new(client_id, client_secret))
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: String) -> Self {
        self.tokens = self.tokens.with_token_url(token_url);
        self
    }

    /// Bounds every request, the token exchange included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ApiClient for EonApi {
    fn http_get(&self, path: &str, query_string: &[(String, String)]) -> Result<Option<String>> {
        let token = self.tokens.access_token(&self.http, self.timeout)?;
        let url = format!("{}{}", self.base_url, path);

        debug!(%url, ?query_string, "GET");
        let mut request = self
            .http
            .get(&url)
            .query(&query_string)
            .bearer_auth(token.secret());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send()?;

        let status = response.status().as_u16();
        if status == 204 {
            debug!(%url, "no content");
            return Ok(None);
        }

        let body = response.text()?;
        if status != 200 {
            warn!(%url, status, "request failed");
            return Err(Error::api(status, body));
        }

        Ok(Some(body))
    }
}

impl Navigator for EonApi {
    fn access_token(&self) -> Result<AccessToken> {
        self.tokens.access_token(&self.http, self.timeout)
    }

    fn installations(&self, filter: &[String]) -> Result<InstallationsResponse> {
        Installations::new(self).list(filter)
    }

    fn measurement_series(&self) -> Result<MeasurementSeriesResponse> {
        Installations::new(self).measurement_series()
    }

    fn measurements(
        &self,
        series_id: i64,
        resolution: Resolution,
        range: DateRange,
        include_missing: bool,
    ) -> Result<MeasurementsResponse> {
        Measurements::new(self).get(series_id, resolution, range, include_missing)
    }

    fn costs(&self, installation_id: &str, range: DateRange) -> Result<CostStatement> {
        Costs::new(self).get(installation_id, range)
    }

    fn is_alive(&self) -> bool {
        let url = format!("{}/", self.base_url);
        let mut request = self.http.get(&url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        match request.send() {
            Ok(response) => {
                debug!(%url, status = response.status().as_u16(), "API reachable");
                true
            }
            Err(e) => {
                debug!(%url, error = %e, "API unreachable");
                false
            }
        }
    }
}
