use std::fmt;

use thiserror::Error;

/// Classified failure of a resource request, derived from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 204, for endpoints where an empty reply is an error
    NoContent,
    /// 400, check the request parameters
    BadRequest,
    /// 401, invalid or expired token
    Unauthorized,
    /// 404
    NotFound,
    /// 429, rate limit exceeded
    TooManyRequests,
    /// 500
    ServerError,
    /// Anything else, kept for diagnostics
    UnexpectedStatus(u16),
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::NoContent => write!(f, "no content available"),
            ApiErrorKind::BadRequest => write!(f, "bad request - check parameters"),
            ApiErrorKind::Unauthorized => write!(f, "unauthorized - check client credentials"),
            ApiErrorKind::NotFound => write!(f, "resource not found"),
            ApiErrorKind::TooManyRequests => write!(f, "too many requests - rate limit exceeded"),
            ApiErrorKind::ServerError => write!(f, "server error"),
            ApiErrorKind::UnexpectedStatus(code) => write!(f, "unexpected status code: {code}"),
        }
    }
}

/// Maps an HTTP status code to its error kind. `200` is the only success.
pub fn classify(status: u16) -> Option<ApiErrorKind> {
    match status {
        200 => None,
        204 => Some(ApiErrorKind::NoContent),
        400 => Some(ApiErrorKind::BadRequest),
        401 => Some(ApiErrorKind::Unauthorized),
        404 => Some(ApiErrorKind::NotFound),
        429 => Some(ApiErrorKind::TooManyRequests),
        500 => Some(ApiErrorKind::ServerError),
        code => Some(ApiErrorKind::UnexpectedStatus(code)),
    }
}

/// Every failure the client can surface. Nothing is retried or recovered
/// locally; each variant carries enough context to diagnose the failure
/// without a second round trip.
#[derive(Debug, Error)]
pub enum Error {
    /// No response was received (connection refused, DNS, TLS, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The client-credentials exchange failed or was rejected.
    /// `status` is `None` when the token endpoint could not be reached.
    #[error("authentication failed{}: {body}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    AuthenticationFailed { status: Option<u16>, body: String },

    /// A date field matched none of the accepted formats.
    #[error("malformed timestamp: {raw:?}")]
    MalformedTimestamp { raw: String },

    /// The costs endpoint answered 204.
    #[error("no cost data available for installation {installation_id}")]
    NoCostData { installation_id: String },

    /// Any non-200 reply a resource endpoint does not handle itself.
    #[error("{kind} (status {status}): {body}")]
    Api {
        kind: ApiErrorKind,
        status: u16,
        body: String,
    },

    /// A 200 reply whose body did not match the expected shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String, body: String },

    #[error("{0} must be set")]
    MissingCredentials(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// True for both flavours of "the server had nothing to return".
    pub fn is_no_content(&self) -> bool {
        matches!(
            self,
            Error::NoCostData { .. }
                | Error::Api {
                    kind: ApiErrorKind::NoContent,
                    ..
                }
        )
    }

    /// The classified kind, for errors that came from a resource endpoint.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api { kind, .. } => Some(*kind),
            Error::NoCostData { .. } => Some(ApiErrorKind::NoContent),
            _ => None,
        }
    }

    pub(crate) fn api(status: u16, body: String) -> Self {
        let kind = classify(status).unwrap_or(ApiErrorKind::UnexpectedStatus(status));
        Error::Api { kind, status, body }
    }

    pub(crate) fn decode(err: &serde_json::Error, body: &str) -> Self {
        Error::Decode {
            message: err.to_string(),
            body: body.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_documented_statuses() {
        assert_eq!(classify(200), None);
        assert_eq!(classify(204), Some(ApiErrorKind::NoContent));
        assert_eq!(classify(400), Some(ApiErrorKind::BadRequest));
        assert_eq!(classify(401), Some(ApiErrorKind::Unauthorized));
        assert_eq!(classify(404), Some(ApiErrorKind::NotFound));
        assert_eq!(classify(429), Some(ApiErrorKind::TooManyRequests));
        assert_eq!(classify(500), Some(ApiErrorKind::ServerError));
        assert_eq!(classify(418), Some(ApiErrorKind::UnexpectedStatus(418)));
    }

    #[test]
    fn other_success_codes_are_unexpected() {
        assert_eq!(classify(201), Some(ApiErrorKind::UnexpectedStatus(201)));
        assert_eq!(classify(503), Some(ApiErrorKind::UnexpectedStatus(503)));
    }

    #[test]
    fn api_error_message_carries_status_and_body() {
        let err = Error::api(429, "slow down".to_string());
        assert_eq!(err.api_kind(), Some(ApiErrorKind::TooManyRequests));
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("slow down"));
        assert!(msg.contains("rate limit"));
    }

    #[test]
    fn no_content_flavours() {
        let costs = Error::NoCostData {
            installation_id: "inst-1".to_string(),
        };
        assert!(costs.is_no_content());
        assert!(costs.to_string().contains("no cost data available"));
        assert!(Error::api(204, String::new()).is_no_content());
        assert!(!Error::api(404, String::new()).is_no_content());
    }

    #[test]
    fn authentication_failure_message() {
        let err = Error::AuthenticationFailed {
            status: Some(401),
            body: "invalid_client".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "authentication failed with status 401: invalid_client"
        );

        let err = Error::AuthenticationFailed {
            status: None,
            body: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "authentication failed: connection refused");
    }
}
