use std::future::Future;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use serde_json::Value as JsonValue;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;

/// A request with credentials attached, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl PreparedRequest {
    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Status and raw body bytes of any response, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// No response arrived: connect failure or timeout.
    #[error("{0}")]
    NoResponse(String),
    /// A status line arrived but the body could not be read.
    #[error("status {status}, body unreadable: {reason}")]
    Body { status: u16, reason: String },
}

/// Moves a [`PreparedRequest`] over the wire.
///
/// Cookie handling belongs to the transport: cookies set by the backend
/// (including the ones rotated by a reissue) must be sent on later requests.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport with a cookie store.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with cookies enabled and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The client should have a cookie store, otherwise reissued cookies are lost.
    #[must_use]
    pub fn with_http_client(client: reqwest::Client) -> Self {
        Self { http: client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        let http = self.http.clone();
        async move {
            let mut builder = http.request(request.method, request.url);
            for (name, value) in &request.headers {
                let (name, value) = header_pair(name, value).map_err(TransportError::NoResponse)?;
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_string());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::NoResponse(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body {
                    status,
                    reason: e.to_string(),
                })?;
            Ok(RawResponse::new(status, body.to_vec()))
        }
    }
}

/// Typed header pair, or why it cannot go on the wire.
pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| format!("invalid value for header {name}: {e}"))?;
    Ok((header, value))
}
