use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::transport::{RawResponse, TransportError};
use crate::config::RetryPolicy;
use crate::error::Error;

/// Successful (2xx) response handed back to the caller unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    /// HTTP status, always 2xx.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Body bytes exactly as received.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, if it is valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Deserialize the body. An empty body reads as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if self.body.trim_ascii().is_empty() {
            return serde_json::from_value(JsonValue::Null).map_err(Into::into);
        }
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// The body as a JSON value. An empty body is `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not JSON.
    pub fn value(&self) -> Result<JsonValue, Error> {
        self.json()
    }
}

impl From<RawResponse> for ApiResponse {
    fn from(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            body: raw.body,
        }
    }
}

/// Classified result of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok(ApiResponse),
    /// Status covered by the retry policy.
    AuthExpired { status: u16, message: String },
    NetworkError(String),
    ServerError { status: u16, message: String },
}

impl Outcome {
    #[must_use]
    pub fn classify(result: Result<RawResponse, TransportError>, policy: &RetryPolicy) -> Self {
        match result {
            Err(TransportError::NoResponse(reason)) => Self::NetworkError(reason),
            // A response did arrive, so this is not a network failure.
            Err(TransportError::Body { status, reason }) => Self::ServerError {
                status,
                message: format!("Response body could not be read ({reason})"),
            },
            Ok(raw) if raw.is_success() => Self::Ok(raw.into()),
            Ok(raw) => {
                let message = extract_message(raw.status, &String::from_utf8_lossy(&raw.body));
                if policy.triggers(raw.status) {
                    Self::AuthExpired {
                        status: raw.status,
                        message,
                    }
                } else {
                    Self::ServerError {
                        status: raw.status,
                        message,
                    }
                }
            }
        }
    }
}

/// Human-readable message from an error body.
///
/// Prefers a non-empty string `message` field, then the raw body, then a
/// generic status line.
#[must_use]
pub fn extract_message(status: u16, body: &str) -> String {
    if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(body) {
        if let Some(message) = map
            .get("message")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
        {
            return message.to_owned();
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("Request failed with status code {status}")
    } else {
        body.to_owned()
    }
}
