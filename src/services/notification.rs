use std::cmp::Reverse;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};
use ulid::Ulid;

use super::{bool_field, items, payload, str_field};
use crate::error::Error;
use crate::pipeline::{ApiClient, ApiRequest, Transport, identity_headers};
use crate::storage::{DurableStorage, NOTIFICATIONS_KEY};

const PATH: &str = "/notifications";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub read: bool,
}

fn default_category() -> String {
    "system".into()
}

/// Content of a locally pushed notification.
#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
}

/// Source of the user's notifications.
pub trait NotificationProvider: Send + Sync {
    /// Newest first.
    fn list(&self) -> impl Future<Output = Result<Vec<Notification>, Error>> + Send;

    fn mark_read(&self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn mark_all_read(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Backend notifications, authorized by gateway identity headers.
pub struct HttpNotificationProvider<'a, T: Transport> {
    client: &'a ApiClient<T>,
}

impl<'a, T: Transport> HttpNotificationProvider<'a, T> {
    #[must_use]
    pub fn new(client: &'a ApiClient<T>) -> Self {
        Self { client }
    }

    fn request(&self, request: ApiRequest) -> ApiRequest {
        request.with_headers(identity_headers(&self.client.session().snapshot()))
    }
}

impl<T: Transport> NotificationProvider for HttpNotificationProvider<'_, T> {
    async fn list(&self) -> Result<Vec<Notification>, Error> {
        let body: JsonValue = self
            .client
            .send_json(&self.request(ApiRequest::get(PATH)))
            .await?;
        let mut list: Vec<Notification> = items(payload(&body))
            .iter()
            .filter_map(normalize_notification)
            .collect();
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn mark_read(&self, id: &str) -> Result<(), Error> {
        let request = self.request(ApiRequest::patch(format!("{PATH}/{id}/read")));
        self.client.send(&request).await.map(|_| ())
    }

    async fn mark_all_read(&self) -> Result<(), Error> {
        let request = self.request(ApiRequest::post(format!("{PATH}/mark-all-read")));
        self.client.send(&request).await.map(|_| ())
    }
}

/// Notifications kept in durable storage, for demos and offline use.
#[derive(Clone)]
pub struct LocalNotificationProvider {
    storage: Arc<dyn DurableStorage>,
}

impl LocalNotificationProvider {
    #[must_use]
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self { storage }
    }

    /// Add an unread notification at the front of the list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on storage failure.
    pub fn push(&self, new: NewNotification) -> Result<Notification, Error> {
        let notification = Notification {
            id: Ulid::new().to_string(),
            title: new.title.unwrap_or_else(|| "알림".into()),
            body: new.body.unwrap_or_default(),
            category: new.category.unwrap_or_else(default_category),
            created_at: Some(OffsetDateTime::now_utc()),
            read: false,
        };
        let mut list = self.load()?;
        list.insert(0, notification.clone());
        self.save(&list)?;
        Ok(notification)
    }

    // Unreadable data reads as an empty list.
    fn load(&self) -> Result<Vec<Notification>, Error> {
        let Some(raw) = self.storage.get(NOTIFICATIONS_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable local notifications");
            Vec::new()
        }))
    }

    fn save(&self, list: &[Notification]) -> Result<(), Error> {
        self.storage
            .set(NOTIFICATIONS_KEY, &serde_json::to_string(list)?)
    }

    fn update(&self, f: impl Fn(&mut Notification)) -> Result<(), Error> {
        let mut list = self.load()?;
        list.iter_mut().for_each(f);
        self.save(&list)
    }
}

impl NotificationProvider for LocalNotificationProvider {
    async fn list(&self) -> Result<Vec<Notification>, Error> {
        let mut list = self.load()?;
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn mark_read(&self, id: &str) -> Result<(), Error> {
        self.update(|n| {
            if n.id == id {
                n.read = true;
            }
        })
    }

    async fn mark_all_read(&self) -> Result<(), Error> {
        self.update(|n| n.read = true)
    }
}

fn sort_newest_first(list: &mut [Notification]) {
    // Undated entries sort last; the sort is stable.
    list.sort_by_key(|n| Reverse(n.created_at));
}

/// Normalize one backend notification. Entries without an id are skipped.
#[must_use]
pub fn normalize_notification(raw: &JsonValue) -> Option<Notification> {
    let id = str_field(raw, &["id", "notificationId"])?;
    let body = str_field(raw, &["body", "content", "message"]).unwrap_or_default();
    Some(Notification {
        id,
        title: str_field(raw, &["title"]).unwrap_or_else(|| body.clone()),
        body,
        category: str_field(raw, &["category", "type"]).unwrap_or_else(default_category),
        created_at: str_field(raw, &["createdAt", "created_at"]).and_then(|s| parse_timestamp(&s)),
        read: bool_field(raw, &["read", "isRead"]).unwrap_or(false),
    })
}

/// RFC 3339, or an ISO 8601 local timestamp taken as UTC.
fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok().or_else(|| {
        PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::testing::{ScriptedTransport, harness};
    use crate::pipeline::{MEMBER_ID_HEADER, USER_ID_HEADER};
    use crate::storage::MemoryStorage;

    #[test]
    fn normalizes_backend_shapes() {
        let n = normalize_notification(&json!({
            "notificationId": 3,
            "content": "챌린지가 시작되었습니다",
            "type": "challenge",
            "createdAt": "2025-05-01T08:30:00",
            "isRead": true
        }))
        .unwrap();
        assert_eq!(n.id, "3");
        assert_eq!(n.title, "챌린지가 시작되었습니다");
        assert_eq!(n.category, "challenge");
        assert!(n.read);
        assert_eq!(n.created_at.unwrap().hour(), 8);
    }

    #[test]
    fn timestamps_with_offsets() {
        let t = parse_timestamp("2025-05-01T08:30:00+09:00").unwrap();
        assert_eq!(t.offset().whole_hours(), 9);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[tokio::test]
    async fn http_provider_sends_identity_headers() {
        let transport = ScriptedTransport::new()
            .respond(
                "/notifications",
                200,
                r#"[{"id":1,"title":"old","createdAt":"2025-01-01T00:00:00Z"},{"id":2,"title":"new","createdAt":"2025-02-01T00:00:00Z"}]"#,
            )
            .respond("/notifications/2/read", 200, "")
            .respond("/notifications/mark-all-read", 200, "");
        let h = harness(transport, true);
        let provider = HttpNotificationProvider::new(&h.client);

        let list = provider.list().await.unwrap();
        provider.mark_read("2").await.unwrap();
        provider.mark_all_read().await.unwrap();

        assert_eq!(list[0].title, "new");
        let calls = h.client.transport().calls();
        assert!(calls.iter().all(|c| c.header(USER_ID_HEADER) == Some("7")));
        assert!(calls.iter().all(|c| c.header(MEMBER_ID_HEADER) == Some("7")));
        assert_eq!(calls[1].method, crate::pipeline::Method::PATCH);
    }

    #[tokio::test]
    async fn local_provider_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = LocalNotificationProvider::new(storage.clone());

        let first = provider
            .push(NewNotification {
                title: Some("first".into()),
                ..Default::default()
            })
            .unwrap();
        provider.push(NewNotification::default()).unwrap();

        let list = provider.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].title, "first");
        assert_eq!(list[0].title, "알림");
        assert_eq!(list[0].category, "system");

        provider.mark_read(&first.id).await.unwrap();
        let list = provider.list().await.unwrap();
        assert!(list.iter().find(|n| n.id == first.id).unwrap().read);
        assert!(!list.iter().find(|n| n.id != first.id).unwrap().read);

        provider.mark_all_read().await.unwrap();
        assert!(provider.list().await.unwrap().iter().all(|n| n.read));
        assert!(storage.get(NOTIFICATIONS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn local_provider_tolerates_garbage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(NOTIFICATIONS_KEY, "not json").unwrap();
        let provider = LocalNotificationProvider::new(storage);
        assert!(provider.list().await.unwrap().is_empty());
    }
}
