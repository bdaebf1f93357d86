//! OAuth2 client-credentials exchange and the bearer-token cache.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use oauth2::basic::BasicClient;
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use oauth2::{
    AccessToken, AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub(crate) const TOKEN_URL: &str = "https://navigator-api.eon.se/connect/token";
const SCOPE: &str = "navigator";

/// Seconds shaved off the advertised lifetime so a token never expires mid-flight.
pub const SAFETY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: AccessToken,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// When a token issued at `issued_at` should stop being used.
pub fn expiry_from(issued_at: DateTime<Utc>, expires_in: Option<Duration>) -> DateTime<Utc> {
    let lifetime = expires_in
        .and_then(|d| TimeDelta::from_std(d).ok())
        .unwrap_or_else(TimeDelta::zero);
    issued_at + lifetime - TimeDelta::seconds(SAFETY_MARGIN_SECS)
}

/// Owns the client credentials and the cached bearer token.
///
/// The cache is either empty/expired (unauthenticated) or holds a token that
/// is still valid. Checking, refreshing and storing happen under one lock, so
/// concurrent callers share a single exchange and never see a half-written
/// token.
#[derive(Debug)]
pub struct TokenManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: String,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(client_id: ClientId, client_secret: ClientSecret) -> Self {
        TokenManager {
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            cache: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, token_url: String) -> Self {
        self.token_url = token_url;
        self
    }

    /// Returns a valid access token, running the exchange only when the
    /// cached one is missing or expired.
    pub fn access_token(
        &self,
        http: &reqwest::blocking::Client,
        timeout: Option<Duration>,
    ) -> Result<AccessToken> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = cache.as_ref() {
            if cached.is_valid_at(Utc::now()) {
                return Ok(cached.access_token.clone());
            }
            debug!(expired_at = %cached.expires_at, "access token expired");
        }

        let fresh = self.authenticate(http, timeout)?;
        let access_token = fresh.access_token.clone();
        *cache = Some(fresh);

        Ok(access_token)
    }

    fn authenticate(
        &self,
        http: &reqwest::blocking::Client,
        timeout: Option<Duration>,
    ) -> Result<CachedToken> {
        let auth_url = AuthUrl::new(self.token_url.clone())
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.token_url)))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.token_url)))?;

        let client = BasicClient::new(
            self.client_id.clone(),
            Some(self.client_secret.clone()),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        debug!(token_url = %self.token_url, "requesting access token");

        let issued_at = Utc::now();
        let mut reply: Option<(u16, String)> = None;
        let result = client
            .exchange_client_credentials()
            .add_scope(Scope::new(SCOPE.to_string()))
            .request(|request| {
                let response = send(http, timeout, request)?;
                reply = Some((
                    response.status_code.as_u16(),
                    String::from_utf8_lossy(&response.body).into_owned(),
                ));
                Ok::<_, reqwest::Error>(response)
            });

        match result {
            Ok(token) => {
                let expires_at = expiry_from(issued_at, token.expires_in());
                debug!(%expires_at, "access token refreshed");
                Ok(CachedToken {
                    access_token: token.access_token().clone(),
                    expires_at,
                })
            }
            Err(RequestTokenError::Request(err)) => {
                warn!(error = %err, "token endpoint unreachable");
                Err(Error::AuthenticationFailed {
                    status: None,
                    body: err.to_string(),
                })
            }
            Err(err) => {
                let (status, body) = match reply {
                    Some((status, body)) => (Some(status), body),
                    None => (None, err.to_string()),
                };
                warn!(?status, "token exchange rejected");
                Err(Error::AuthenticationFailed { status, body })
            }
        }
    }
}

/// Blocking transport for the oauth2 exchange, on the same reqwest client as
/// the resource requests.
fn send(
    http: &reqwest::blocking::Client,
    timeout: Option<Duration>,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::POST);

    let mut builder = http.request(method, request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    let response = builder.body(request.body).send()?;

    let status_code = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }
    let body = response.bytes()?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer) -> TokenManager {
        TokenManager::new(
            ClientId::new("test-client-id".to_string()),
            ClientSecret::new("test-client-secret".to_string()),
        )
        .with_token_url(format!("{}/connect/token", server.uri()))
    }

    fn seed(manager: &TokenManager, secret: &str, expires_at: DateTime<Utc>) {
        *manager.cache.lock().unwrap() = Some(CachedToken {
            access_token: AccessToken::new(secret.to_string()),
            expires_at,
        });
    }

    async fn mount_token(server: &MockServer, token: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=navigator"))
            .and(body_string_contains("client_id=test-client-id"))
            .and(body_string_contains("client_secret=test-client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "navigator"
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[test]
    fn expiry_applies_safety_margin() {
        let now = Utc::now();
        let expires_at = expiry_from(now, Some(Duration::from_secs(3600)));
        let remaining = (expires_at - now).num_seconds();
        assert!((3540..3600).contains(&remaining), "{remaining}");
    }

    #[test]
    fn missing_lifetime_expires_immediately() {
        let now = Utc::now();
        assert!(expiry_from(now, None) < now);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cached_token_skips_exchange() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh-token", 0).await;

        let manager = manager(&server);
        seed(&manager, "cached-token", Utc::now() + TimeDelta::hours(1));

        let token = tokio::task::spawn_blocking(move || {
            let http = reqwest::blocking::Client::new();
            manager.access_token(&http, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(token.secret(), "cached-token");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_token_is_refreshed_once() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh-token", 1).await;

        let manager = manager(&server);
        seed(&manager, "stale-token", Utc::now() - TimeDelta::hours(1));

        let (first, second, expires_at) = tokio::task::spawn_blocking(move || {
            let http = reqwest::blocking::Client::new();
            let first = manager.access_token(&http, None).unwrap();
            let second = manager.access_token(&http, None).unwrap();
            let expires_at = manager.cache.lock().unwrap().as_ref().unwrap().expires_at;
            (first, second, expires_at)
        })
        .await
        .unwrap();

        assert_eq!(first.secret(), "fresh-token");
        assert_eq!(second.secret(), "fresh-token");
        let remaining = (expires_at - Utc::now()).num_seconds();
        assert!((3530..3600).contains(&remaining), "{remaining}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_callers_share_one_exchange() {
        let server = MockServer::start().await;
        mount_token(&server, "shared-token", 1).await;

        let manager = manager(&server);

        let tokens = tokio::task::spawn_blocking(move || {
            let http = reqwest::blocking::Client::new();
            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|_| scope.spawn(|| manager.access_token(&http, None).unwrap()))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap().secret().clone())
                    .collect::<Vec<_>>()
            })
        })
        .await
        .unwrap();

        assert_eq!(tokens.len(), 8);
        assert!(tokens.iter().all(|t| t == "shared-token"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_exchange_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let (result, cached) = tokio::task::spawn_blocking(move || {
            let http = reqwest::blocking::Client::new();
            let result = manager.access_token(&http, None);
            let cached = manager.cache.lock().unwrap().is_some();
            (result, cached)
        })
        .await
        .unwrap();

        match result {
            Err(Error::AuthenticationFailed { status, body }) => {
                assert_eq!(status, Some(401));
                assert!(body.contains("invalid_client"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!cached);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_token_endpoint_fails_without_status() {
        let manager = TokenManager::new(
            ClientId::new("id".to_string()),
            ClientSecret::new("secret".to_string()),
        )
        .with_token_url("http://127.0.0.1:1/connect/token".to_string());

        let result = tokio::task::spawn_blocking(move || {
            let http = reqwest::blocking::Client::new();
            manager.access_token(&http, None)
        })
        .await
        .unwrap();

        assert!(matches!(
            result,
            Err(Error::AuthenticationFailed { status: None, .. })
        ));
    }
}
