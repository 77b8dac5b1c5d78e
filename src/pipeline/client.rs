use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use super::outcome::{ApiResponse, Outcome};
use super::request::{ApiRequest, Attempt};
use super::transport::{PreparedRequest, ReqwestTransport, Transport, header_pair};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::notify::Notifier;
use crate::session::SessionContext;

/// Authenticated request pipeline.
///
/// Every feature call goes through [`send`](Self::send), which attaches
/// credentials, recovers from one credential expiry by reissuing and replaying,
/// and publishes user-facing failures to the [`Notifier`].
pub struct ApiClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
    session: Arc<SessionContext>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client backed by `reqwest` with a cookie store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        session: Arc<SessionContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, transport, session, notifier))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Create a client over any [`Transport`].
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        transport: T,
        session: Arc<SessionContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            transport,
            session,
            notifier,
        }
    }

    /// Get the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the shared session this client reads and tears down.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Get the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` and return the 2xx response.
    ///
    /// A status covered by the retry policy while signed in triggers exactly
    /// one credential reissue followed by exactly one replay of `request`.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] when no response arrives (also published to the notifier).
    /// - [`Error::Server`] for other failures (message published to the notifier).
    /// - [`Error::AuthExpired`] when the replay is rejected again (session torn down).
    /// - [`Error::ReissueFailed`] when the reissue call fails (session torn down).
    /// - [`Error::Config`] when the request URL or a header cannot be built
    ///   (nothing is sent).
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let url = self.endpoint(request)?;

        if self.is_reissue_request(request) {
            return self.send_reissue(request, url).await;
        }

        let mut attempt = Attempt::Initial;
        loop {
            match self.dispatch(request, &url, attempt).await? {
                Outcome::AuthExpired { status, .. }
                    if attempt.may_reissue() && self.session.is_signed_in() =>
                {
                    tracing::debug!(path = request.path(), status, "Credentials rejected, reissuing");
                    self.reissue().await?;
                    attempt = Attempt::Replay;
                }
                Outcome::AuthExpired { status, .. } if attempt == Attempt::Replay => {
                    tracing::warn!(path = request.path(), status, "Replay rejected after reissue");
                    self.session.teardown();
                    return Err(Error::AuthExpired { status });
                }
                outcome => return self.settle(outcome),
            }
        }
    }

    /// [`send`](Self::send) and deserialize the body.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus [`Error::Decode`].
    pub async fn send_json<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, Error> {
        self.send(request).await?.json()
    }

    /// Exchange the current credentials for fresh ones.
    ///
    /// Never retried. Any failure tears the session down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReissueFailed`] on any failure.
    pub async fn reissue(&self) -> Result<(), Error> {
        let request = ApiRequest::post(&self.config.reissue_path);
        let url = self.endpoint(&request)?;
        self.send_reissue(&request, url).await?;

        let delay = self.config.settle_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn send_reissue(&self, request: &ApiRequest, url: Url) -> Result<ApiResponse, Error> {
        match self.dispatch(request, &url, Attempt::Initial).await? {
            Outcome::Ok(response) => {
                self.capture_access_token(&response);
                tracing::info!("Credentials reissued");
                Ok(response)
            }
            Outcome::NetworkError(reason) => {
                tracing::warn!(error = %reason, "Credential reissue got no response");
                self.notifier.notify(&self.config.network_error_message);
                self.session.teardown();
                Err(Error::ReissueFailed(reason))
            }
            Outcome::AuthExpired { status, message } | Outcome::ServerError { status, message } => {
                tracing::warn!(status, message = %message, "Credential reissue rejected");
                self.session.teardown();
                Err(Error::ReissueFailed(format!("status {status}: {message}")))
            }
        }
    }

    fn settle(&self, outcome: Outcome) -> Result<ApiResponse, Error> {
        match outcome {
            Outcome::Ok(response) => Ok(response),
            Outcome::NetworkError(reason) => {
                tracing::warn!(error = %reason, "Request got no response");
                self.notifier.notify(&self.config.network_error_message);
                Err(Error::Network(reason))
            }
            Outcome::AuthExpired { status, message } | Outcome::ServerError { status, message } => {
                tracing::debug!(status, message = %message, "Request failed");
                self.notifier.notify(&message);
                Err(Error::Server { status, message })
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &Url,
        attempt: Attempt,
    ) -> Result<Outcome, Error> {
        let prepared = self.prepare(request, url.clone())?;
        let result = self.transport.execute(prepared).await;
        let outcome = Outcome::classify(result, &self.config.retry_policy);
        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            attempt = ?attempt,
            outcome = outcome_label(&outcome),
            "API call"
        );
        Ok(outcome)
    }

    // Credentials are attached per send so a replay carries what the reissue stored.
    fn prepare(&self, request: &ApiRequest, url: Url) -> Result<PreparedRequest, Error> {
        let mut headers = request.headers().to_vec();
        let has_authorization = headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(AUTHORIZATION.as_str()));
        if self.config.attach_bearer && !has_authorization {
            if let Some(token) = self.session.access_token() {
                headers.push((AUTHORIZATION.as_str().to_owned(), format!("Bearer {token}")));
            }
        }
        for (name, value) in &headers {
            header_pair(name, value).map_err(Error::Config)?;
        }
        Ok(PreparedRequest {
            method: request.method().clone(),
            url,
            headers,
            body: request.body().cloned(),
        })
    }

    fn endpoint(&self, request: &ApiRequest) -> Result<Url, Error> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                Error::Config(format!("base URL cannot carry a path: {}", self.config.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(request.path().split('/').filter(|s| !s.is_empty()));
        }
        if !request.query().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query());
        }
        Ok(url)
    }

    fn is_reissue_request(&self, request: &ApiRequest) -> bool {
        request.path() == self.config.reissue_path
    }

    fn capture_access_token(&self, response: &ApiResponse) {
        let Ok(body) = response.value() else {
            return;
        };
        let token = [&body, &body["result"], &body["data"]]
            .into_iter()
            .find_map(|v| v.get("accessToken").and_then(JsonValue::as_str));
        if let Some(token) = token {
            if let Err(e) = self.session.set_credentials(Some(token)) {
                tracing::warn!(error = %e, "Storing reissued access token failed");
            }
        }
    }
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Ok(response) => response.status().to_string(),
        Outcome::AuthExpired { status, .. } => format!("{status} (auth)"),
        Outcome::ServerError { status, .. } => status.to_string(),
        Outcome::NetworkError(_) => "no response".into(),
    }
}
