use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Backend user identifier (`userId`).
///
/// Anonymous requests that still need an identity header send `0`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub const ANONYMOUS: Self = Self(0);
}

/// Community post identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct PostId(pub i64);

/// Community comment identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct CommentId(pub i64);

/// Point shop item identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

/// Signed-in user as the client keeps it.
///
/// Field names follow the persisted camelCase layout so a stored session
/// written by an older client rehydrates unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default, alias = "nickname")]
    pub nick_name: String,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default)]
    pub point: i64,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub challenge_role: Option<String>,
}

impl UserProfile {
    /// Create a profile with only the required `user_id`.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            nick_name: String::new(),
            pic: None,
            point: 0,
            xp: 0,
            challenge_role: None,
        }
    }

    #[must_use]
    pub fn with_nick_name(mut self, nick_name: impl Into<String>) -> Self {
        self.nick_name = nick_name.into();
        self
    }

    #[must_use]
    pub fn with_pic(mut self, pic: impl Into<String>) -> Self {
        self.pic = Some(pic.into());
        self
    }

    #[must_use]
    pub fn with_point(mut self, point: i64) -> Self {
        self.point = point;
        self
    }

    #[must_use]
    pub fn with_xp(mut self, xp: i64) -> Self {
        self.xp = xp;
        self
    }

    #[must_use]
    pub fn with_challenge_role(mut self, role: impl Into<String>) -> Self {
        self.challenge_role = Some(role.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_and_displays() {
        let id: UserId = "42".parse().unwrap();
        assert_eq!(id, UserId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn profile_reads_persisted_camel_case() {
        let json = r#"{"userId":7,"nickName":"runner","pic":null,"point":1200,"xp":30,"challengeRole":"BRONZE"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_id, UserId(7));
        assert_eq!(profile.nick_name, "runner");
        assert_eq!(profile.point, 1200);
        assert_eq!(profile.challenge_role.as_deref(), Some("BRONZE"));
    }

    #[test]
    fn profile_tolerates_missing_economy_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"userId":3,"nickname":"lowercase"}"#).unwrap();
        assert_eq!(profile.nick_name, "lowercase");
        assert_eq!(profile.point, 0);
        assert_eq!(profile.pic, None);
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_post(_: PostId) {}
        fn takes_item(_: ItemId) {}

        takes_post(PostId(1));
        takes_item(ItemId(1));
        // takes_post(ItemId(1));  // Compile error!
    }
}
