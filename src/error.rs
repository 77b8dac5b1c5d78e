/// Errors returned by the API client, the session store and the feature services.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No response was received (connect failure, timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials were rejected and could not be recovered by a reissue.
    #[error("Authentication expired (status {status})")]
    AuthExpired { status: u16 },

    /// The credential reissue call itself failed. The session has been torn down.
    #[error("Credential reissue failed: {0}")]
    ReissueFailed(String),

    /// Any other non-success response.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// A service refused the operation before contacting the backend.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by the error, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired { status } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure ended the signed-in session.
    #[must_use]
    pub fn is_session_ending(&self) -> bool {
        matches!(self, Self::AuthExpired { .. } | Self::ReissueFailed(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
