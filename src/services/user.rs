use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{payload, str_field};
use crate::error::Error;
use crate::pipeline::{ApiClient, ApiRequest, Transport};
use crate::types::{UserId, UserProfile};

const PATH: &str = "/user";

/// Credentials for `POST /user/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub uid: String,
    pub upw: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(uid: impl Into<String>, upw: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            upw: upw.into(),
        }
    }
}

/// Log in and make the returned profile the signed-in user.
///
/// A bearer token in the response, if any, is stored for legacy endpoints.
///
/// # Errors
///
/// Pipeline errors, [`Error::Decode`] for an unexpected payload, or
/// [`Error::Storage`] if the session cannot be persisted.
pub async fn login<T: Transport>(
    client: &ApiClient<T>,
    credentials: &LoginRequest,
) -> Result<UserProfile, Error> {
    let request = ApiRequest::post(format!("{PATH}/login")).with_json(credentials)?;
    let body: JsonValue = client.send_json(&request).await?;
    let inner = payload(&body);

    let profile: UserProfile = serde_json::from_value(inner.clone())?;
    if let Some(token) = str_field(inner, &["accessToken"]) {
        client.session().set_credentials(Some(token.as_str()))?;
    }
    client.session().set_signed_user(profile.clone())?;
    Ok(profile)
}

/// Log out on the backend, then tear the local session down whatever the
/// backend answered.
///
/// # Errors
///
/// The backend error, if any. The local session is anonymous either way.
pub async fn logout<T: Transport>(client: &ApiClient<T>) -> Result<(), Error> {
    let result = client.send(&ApiRequest::post(format!("{PATH}/logout"))).await;
    client.session().teardown();
    result.map(|_| ())
}

/// Explicit credential reissue through the pipeline.
///
/// # Errors
///
/// [`Error::ReissueFailed`]; the session is torn down in that case.
pub async fn reissue<T: Transport>(client: &ApiClient<T>) -> Result<(), Error> {
    client
        .send(&ApiRequest::post(client.config().reissue_path()))
        .await
        .map(|_| ())
}

/// Public profile of any user.
///
/// # Errors
///
/// Pipeline errors or [`Error::Decode`].
pub async fn fetch_profile<T: Transport>(
    client: &ApiClient<T>,
    user_id: UserId,
) -> Result<UserProfile, Error> {
    let request =
        ApiRequest::get(format!("{PATH}/profile")).with_query("profile_user_id", user_id);
    let body: JsonValue = client.send_json(&request).await?;
    serde_json::from_value(payload(&body).clone()).map_err(Into::into)
}

/// Re-read the point balance and store it on the signed-in user.
///
/// # Errors
///
/// Pipeline errors, or [`Error::Decode`] if no balance is present.
pub async fn refresh_point_balance<T: Transport>(client: &ApiClient<T>) -> Result<i64, Error> {
    let balance = super::pointshop::fetch_balance(client).await?;
    client.session().set_point(balance)?;
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedTransport, harness};
    use crate::storage::{DurableStorage, SESSION_KEY};

    #[tokio::test]
    async fn login_signs_in_and_persists() {
        let transport = ScriptedTransport::new().respond(
            "/user/login",
            200,
            r#"{"resultMessage":"ok","result":{"userId":11,"nickName":"mina","point":300,"accessToken":"t1"}}"#,
        );
        let h = harness(transport, false);

        let profile = login(&h.client, &LoginRequest::new("mina", "pw")).await.unwrap();

        assert_eq!(profile.user_id, UserId(11));
        assert_eq!(h.session.current_user_id(), Some(UserId(11)));
        assert_eq!(h.session.access_token().as_deref(), Some("t1"));
        assert!(h.storage.get(SESSION_KEY).unwrap().is_some());
        let sent = &h.client.transport().calls()[0];
        assert_eq!(sent.body, Some(serde_json::json!({ "uid": "mina", "upw": "pw" })));
    }

    #[tokio::test]
    async fn failed_login_leaves_session_anonymous() {
        let transport = ScriptedTransport::new().respond(
            "/user/login",
            400,
            r#"{"message":"아이디 또는 비밀번호를 확인해주세요"}"#,
        );
        let h = harness(transport, false);

        let err = login(&h.client, &LoginRequest::new("mina", "bad")).await.unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(!h.session.is_signed_in());
        assert_eq!(h.notices.messages().len(), 1);
    }

    #[tokio::test]
    async fn logout_tears_down_even_on_backend_error() {
        let transport = ScriptedTransport::new().fail("/user/logout", "offline");
        let h = harness(transport, true);

        assert!(logout(&h.client).await.is_err());
        assert!(!h.session.is_signed_in());
    }

    #[tokio::test]
    async fn explicit_reissue_failure_tears_down() {
        let transport = ScriptedTransport::new().respond("/user/reissue", 401, "");
        let h = harness(transport, true);

        assert!(matches!(reissue(&h.client).await, Err(Error::ReissueFailed(_))));
        assert!(!h.session.is_signed_in());
    }

    #[tokio::test]
    async fn fetch_profile_sends_query_and_unwraps_result() {
        let transport = ScriptedTransport::new().respond(
            "/user/profile",
            200,
            r#"{"result":{"userId":3,"nickName":"jun","xp":80}}"#,
        );
        let h = harness(transport, true);

        let profile = fetch_profile(&h.client, UserId(3)).await.unwrap();

        assert_eq!(profile.nick_name, "jun");
        assert_eq!(profile.xp, 80);
        assert_eq!(
            h.client.transport().calls()[0].url.query(),
            Some("profile_user_id=3")
        );
    }

    #[tokio::test]
    async fn point_refresh_updates_session() {
        let transport = ScriptedTransport::new().respond(
            "/pointshop/user/points",
            200,
            r#"{"data":{"pointBalance":4200}}"#,
        );
        let h = harness(transport, true);

        assert_eq!(refresh_point_balance(&h.client).await.unwrap(), 4200);
        assert_eq!(h.session.snapshot().signed_user.unwrap().point, 4200);
    }
}
