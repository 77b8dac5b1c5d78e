//! Scripted transport and fixtures shared by the pipeline and service tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use super::client::ApiClient;
use super::transport::{PreparedRequest, RawResponse, Transport, TransportError};
use crate::config::ClientConfig;
use crate::notify::Notifier;
use crate::session::SessionContext;
use crate::storage::MemoryStorage;
use crate::types::{UserId, UserProfile};

pub(crate) const BASE_URL: &str = "http://api.test/api/OTD";
const BASE_PATH: &str = "/api/OTD";

type Scripted = Result<RawResponse, TransportError>;

/// Answers each path from a queue of canned responses, in order.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, path: &str, status: u16, body: impl Into<String>) -> Self {
        self.push(path, Ok(RawResponse::new(status, body.into())))
    }

    pub(crate) fn fail(self, path: &str, reason: &str) -> Self {
        self.push(path, Err(TransportError::NoResponse(reason.to_owned())))
    }

    fn push(self, path: &str, entry: Scripted) -> Self {
        self.script
            .lock()
            .entry(path.to_owned())
            .or_default()
            .push_back(entry);
        self
    }

    pub(crate) fn calls(&self) -> Vec<PreparedRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| relative_path(c) == path)
            .count()
    }
}

fn relative_path(request: &PreparedRequest) -> String {
    let path = request.url.path();
    path.strip_prefix(BASE_PATH).unwrap_or(path).to_owned()
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        request: PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        let path = relative_path(&request);
        self.calls.lock().push(request);
        let next = self
            .script
            .lock()
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        let result = next.unwrap_or_else(|| panic!("unscripted request to {path}"));
        async move { result }
    }
}

/// Collects every published message.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}

pub(crate) struct Harness {
    pub(crate) client: ApiClient<ScriptedTransport>,
    pub(crate) session: Arc<SessionContext>,
    pub(crate) notices: Arc<RecordingNotifier>,
    pub(crate) storage: Arc<MemoryStorage>,
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new(BASE_URL.parse().expect("valid test URL"))
}

pub(crate) fn test_user() -> UserProfile {
    UserProfile::new(UserId(7))
        .with_nick_name("runner")
        .with_point(1_000)
        .with_challenge_role("BRONZE")
}

pub(crate) fn harness(transport: ScriptedTransport, signed_in: bool) -> Harness {
    harness_with_config(test_config(), transport, signed_in)
}

pub(crate) fn harness_with_config(
    config: ClientConfig,
    transport: ScriptedTransport,
    signed_in: bool,
) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let session = Arc::new(SessionContext::new(storage.clone()));
    if signed_in {
        session
            .set_signed_user(test_user())
            .expect("memory storage never fails");
    }
    let notices = Arc::new(RecordingNotifier::default());
    let client = ApiClient::with_transport(config, transport, session.clone(), notices.clone());
    Harness {
        client,
        session,
        notices,
        storage,
    }
}
