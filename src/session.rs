use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Error;
use crate::storage::{ACCESS_TOKEN_KEY, DurableStorage, SESSION_KEY};
use crate::types::{UserId, UserProfile};

/// Signed-in state as persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_signed: bool,
    #[serde(default)]
    pub signed_user: Option<UserProfile>,
}

impl Session {
    /// The anonymous session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Single owner of the session.
///
/// Every request-building call site receives this context explicitly (usually
/// as `Arc<SessionContext>` through [`ApiClient`](crate::ApiClient)). Each
/// mutation is written through to durable storage.
pub struct SessionContext {
    state: RwLock<Session>,
    storage: Arc<dyn DurableStorage>,
    signed_in: watch::Sender<bool>,
}

impl SessionContext {
    /// Start anonymous, without reading storage.
    #[must_use]
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self::with_state(storage, Session::anonymous())
    }

    /// Restore the session persisted by a previous run.
    ///
    /// A corrupt document is treated as anonymous.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the storage backend cannot be read.
    pub fn rehydrate(storage: Arc<dyn DurableStorage>) -> Result<Self, Error> {
        let session = match storage.get(SESSION_KEY)? {
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => normalize(session),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable persisted session");
                    Session::anonymous()
                }
            },
            None => Session::anonymous(),
        };
        tracing::debug!(signed_in = session.is_signed, "Session rehydrated");
        Ok(Self::with_state(storage, session))
    }

    fn with_state(storage: Arc<dyn DurableStorage>, session: Session) -> Self {
        let (signed_in, _) = watch::channel(session.is_signed);
        Self {
            state: RwLock::new(session),
            storage,
            signed_in,
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.state.read().is_signed
    }

    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        let state = self.state.read();
        state
            .signed_user
            .as_ref()
            .filter(|_| state.is_signed)
            .map(|u| u.user_id)
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    /// Watch the signed-in flag, e.g. to send the user to a login screen
    /// after a forced teardown.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }

    /// Mark the session signed in as `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session cannot be persisted. The
    /// in-memory session is updated regardless.
    pub fn set_signed_user(&self, profile: UserProfile) -> Result<(), Error> {
        tracing::info!(user_id = %profile.user_id, "Session signed in");
        self.mutate(|s| {
            s.is_signed = true;
            s.signed_user = Some(profile);
        })
    }

    /// Replace the avatar path of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session cannot be persisted.
    pub fn set_pic(&self, pic: Option<String>) -> Result<(), Error> {
        self.mutate(|s| {
            if let Some(user) = s.signed_user.as_mut() {
                user.pic = pic;
            }
        })
    }

    /// Replace the point balance of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session cannot be persisted.
    pub fn set_point(&self, point: i64) -> Result<(), Error> {
        self.mutate(|s| {
            if let Some(user) = s.signed_user.as_mut() {
                user.point = point;
            }
        })
    }

    /// Store (or clear) the legacy bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on storage failure.
    pub fn set_credentials(&self, access_token: Option<&str>) -> Result<(), Error> {
        let _state = self.state.write();
        match access_token {
            Some(token) if !token.is_empty() => self.storage.set(ACCESS_TOKEN_KEY, token),
            _ => self.storage.remove(ACCESS_TOKEN_KEY),
        }
    }

    /// Bearer token for the legacy `Authorization` header, if one is stored.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Reading access token failed");
                None
            }
        }
    }

    /// Reset to anonymous and drop persisted credentials.
    ///
    /// Idempotent. Storage failures are logged, never returned: the in-memory
    /// session is always anonymous afterwards.
    pub fn teardown(&self) {
        let mut state = self.state.write();
        let was_signed = state.is_signed;
        *state = Session::anonymous();
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            tracing::warn!(error = %e, "Removing persisted session failed during teardown");
        }
        if let Err(e) = self.storage.remove(ACCESS_TOKEN_KEY) {
            tracing::warn!(error = %e, "Removing access token failed during teardown");
        }
        self.signed_in.send_replace(false);
        drop(state);

        if was_signed {
            tracing::info!("Session torn down");
        }
    }

    // Storage and the watch flag change under the write guard, so writers
    // reach storage in the same order they changed the in-memory state.
    fn mutate(&self, f: impl FnOnce(&mut Session)) -> Result<(), Error> {
        let mut state = self.state.write();
        f(&mut state);
        let snapshot = serde_json::to_string(&*state)?;
        self.signed_in.send_replace(state.is_signed);
        self.storage.set(SESSION_KEY, &snapshot)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

// A signed flag without a user (or the reverse) is treated as anonymous.
fn normalize(session: Session) -> Session {
    if session.is_signed && session.signed_user.is_some() {
        session
    } else {
        Session::anonymous()
    }
}
