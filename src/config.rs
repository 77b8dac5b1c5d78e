use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Default credential reissue endpoint, relative to the base URL.
pub const DEFAULT_REISSUE_PATH: &str = "/user/reissue";

/// Default message published when no response arrives.
pub const DEFAULT_NETWORK_ERROR_MESSAGE: &str =
    "네트워크 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Statuses that mean "credentials expired" and trigger one reissue-and-replay.
///
/// The default also includes 500, which the backend answers when a stale
/// token reaches a downstream service. Use [`RetryPolicy::auth_only`] to
/// restrict the policy to 401/403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Trigger on exactly `statuses`.
    #[must_use]
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        let mut statuses: Vec<u16> = statuses.into_iter().collect();
        statuses.sort_unstable();
        statuses.dedup();
        Self { statuses }
    }

    /// 401 and 403 only.
    #[must_use]
    pub fn auth_only() -> Self {
        Self::new([401, 403])
    }

    /// Never reissue.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new([])
    }

    /// Whether `status` triggers a reissue.
    #[must_use]
    pub fn triggers(&self, status: u16) -> bool {
        self.statuses.binary_search(&status).is_ok()
    }

    /// Get the trigger statuses, sorted.
    #[must_use]
    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new([401, 403, 500])
    }
}

/// API client configuration.
///
/// The base URL is the only required field.
///
/// ```rust,ignore
/// use otd_client::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8080/api/OTD".parse()?)
///     .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) reissue_path: String,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) settle_delay: Duration,
    pub(crate) timeout: Duration,
    pub(crate) network_error_message: String,
    pub(crate) attach_bearer: bool,
}

impl ClientConfig {
    /// Create a config for `base_url` with every other setting at its default.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            reissue_path: DEFAULT_REISSUE_PATH.into(),
            retry_policy: RetryPolicy::default(),
            settle_delay: Duration::ZERO,
            timeout: Duration::from_secs(10),
            network_error_message: DEFAULT_NETWORK_ERROR_MESSAGE.into(),
            attach_bearer: true,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OTD_BASE_URL`: API base URL, e.g. `http://localhost:8080/api/OTD`
    ///
    /// # Optional env vars
    /// - `OTD_REISSUE_PATH`: reissue endpoint path (default `/user/reissue`)
    /// - `OTD_REISSUE_STATUSES`: comma-separated statuses that trigger a reissue
    /// - `OTD_SETTLE_MS`: delay between a successful reissue and the replay
    /// - `OTD_TIMEOUT_SECS`: per-request timeout
    /// - `OTD_NETWORK_ERROR_MESSAGE`: message shown when no response arrives
    /// - `OTD_BEARER`: `"0"` or `"false"` stops attaching the stored bearer token
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `OTD_BASE_URL` is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url: Url = lookup("OTD_BASE_URL")
            .ok_or_else(|| Error::Config("OTD_BASE_URL is required".into()))?
            .parse()
            .map_err(|e| Error::Config(format!("OTD_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(path) = lookup("OTD_REISSUE_PATH") {
            config = config.with_reissue_path(path);
        }
        if let Some(list) = lookup("OTD_REISSUE_STATUSES") {
            let statuses = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u16>()
                        .map_err(|e| Error::Config(format!("OTD_REISSUE_STATUSES: {s}: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_retry_policy(RetryPolicy::new(statuses));
        }
        if let Some(ms) = lookup("OTD_SETTLE_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("OTD_SETTLE_MS: {e}")))?;
            config = config.with_settle_delay(Duration::from_millis(ms));
        }
        if let Some(secs) = lookup("OTD_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("OTD_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(message) = lookup("OTD_NETWORK_ERROR_MESSAGE") {
            config = config.with_network_error_message(message);
        }
        if let Some(flag) = lookup("OTD_BEARER") {
            config = config.with_bearer(!matches!(flag.as_str(), "0" | "false"));
        }

        Ok(config)
    }

    /// Set the reissue endpoint path (normalized to a leading slash).
    #[must_use]
    pub fn with_reissue_path(mut self, path: impl Into<String>) -> Self {
        self.reissue_path = normalize_path(&path.into());
        self
    }

    /// Set the statuses that trigger a reissue.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the pause between a successful reissue and the replay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the message published when no response arrives.
    #[must_use]
    pub fn with_network_error_message(mut self, message: impl Into<String>) -> Self {
        self.network_error_message = message.into();
        self
    }

    /// Attach `Authorization: Bearer` from durable storage (default: on).
    #[must_use]
    pub fn with_bearer(mut self, enabled: bool) -> Self {
        self.attach_bearer = enabled;
        self
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the reissue endpoint path.
    #[must_use]
    pub fn reissue_path(&self) -> &str {
        &self.reissue_path
    }

    /// Get the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Get the settle delay.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Get the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the network failure message.
    #[must_use]
    pub fn network_error_message(&self) -> &str {
        &self.network_error_message
    }

    /// Whether the stored bearer token is attached.
    #[must_use]
    pub fn attach_bearer(&self) -> bool {
        self.attach_bearer
    }
}

/// Leading slash, no trailing slash, no query.
pub(crate) fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default().trim();
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://localhost:8080/api/OTD".parse().unwrap());
        assert_eq!(config.reissue_path(), "/user/reissue");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert!(config.attach_bearer());
        assert_eq!(config.retry_policy().statuses(), &[401, 403, 500]);
    }

    #[test]
    fn retry_policy_membership() {
        let policy = RetryPolicy::auth_only();
        assert!(policy.triggers(401));
        assert!(policy.triggers(403));
        assert!(!policy.triggers(500));
        assert!(!RetryPolicy::disabled().triggers(401));
        assert_eq!(RetryPolicy::new([403, 401, 403]).statuses(), &[401, 403]);
    }

    #[test]
    fn from_lookup_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("OTD_BASE_URL", "https://api.example.com/api/OTD"),
            ("OTD_REISSUE_PATH", "auth/reissue/"),
            ("OTD_REISSUE_STATUSES", "403, 401"),
            ("OTD_SETTLE_MS", "150"),
            ("OTD_TIMEOUT_SECS", "3"),
            ("OTD_BEARER", "false"),
        ]))
        .unwrap();

        assert_eq!(config.base_url().as_str(), "https://api.example.com/api/OTD");
        assert_eq!(config.reissue_path(), "/auth/reissue");
        assert_eq!(config.retry_policy(), &RetryPolicy::auth_only());
        assert_eq!(config.settle_delay(), Duration::from_millis(150));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(!config.attach_bearer());
    }

    #[test]
    fn from_lookup_rejects_bad_numbers() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("OTD_BASE_URL", "http://localhost"),
            ("OTD_REISSUE_STATUSES", "401,abc"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OTD_REISSUE_STATUSES"));

        assert!(
            ClientConfig::from_lookup(lookup(&[
                ("OTD_BASE_URL", "http://localhost"),
                ("OTD_SETTLE_MS", "-1"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn normalize_path_forms() {
        assert_eq!(normalize_path("user/reissue"), "/user/reissue");
        assert_eq!(normalize_path("/user/reissue/"), "/user/reissue");
        assert_eq!(normalize_path("/user/reissue?x=1"), "/user/reissue");
    }
}
