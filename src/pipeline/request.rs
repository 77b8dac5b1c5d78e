use reqwest::Method;
use serde::Serialize;
use serde_json::Value as JsonValue;
use url::form_urlencoded;

use crate::config::normalize_path;
use crate::error::Error;

/// Immutable description of one API call.
///
/// Feature code builds these and hands them to
/// [`ApiClient::send`](super::ApiClient::send); it never deals with
/// credentials. Replays after a reissue send the same descriptor again.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<JsonValue>,
}

impl ApiRequest {
    /// Request for `path`, relative to the configured base URL.
    ///
    /// A `?query` suffix on `path` is kept: its pairs are decoded and sent
    /// ahead of any added with [`with_query`](Self::with_query).
    #[must_use]
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        let raw = path.as_ref();
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (
                path,
                form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect(),
            ),
            None => (raw, Vec::new()),
        };
        Self {
            method,
            path: normalize_path(path),
            query,
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl AsRef<str>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl AsRef<str>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl AsRef<str>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl AsRef<str>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query pair. Repeated keys are all sent.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a request-specific header. Later values for the same name win.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// [`with_header`](Self::with_header) for each pair.
    #[must_use]
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |req, (k, v)| req.with_header(k, v))
    }

    /// Set the JSON payload.
    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `body` cannot be represented as JSON.
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, Error> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized path: leading slash, no trailing slash, no query.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }
}

/// Which send of a logical request this is.
///
/// There are only two: the original send and a single replay after a
/// successful credential reissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Replay,
}

impl Attempt {
    /// Only the first send may trigger a reissue.
    #[must_use]
    pub fn may_reissue(self) -> bool {
        matches!(self, Self::Initial)
    }
}
