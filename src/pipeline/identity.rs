use crate::session::Session;
use crate::types::UserId;

pub const MEMBER_ID_HEADER: &str = "X-MEMBER-ID";
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLES_HEADER: &str = "X-User-Roles";
pub const USER_NICKNAME_HEADER: &str = "X-User-Nickname";

/// Gateway identity headers for endpoints that authorize by header instead
/// of re-deriving identity from the credential.
///
/// Anonymous sessions send user id `0`. Role and nickname are only sent when
/// known.
#[must_use]
pub fn identity_headers(session: &Session) -> Vec<(&'static str, String)> {
    let user = session.signed_user.as_ref().filter(|_| session.is_signed);
    let user_id = user.map_or(UserId::ANONYMOUS, |u| u.user_id).to_string();

    let mut headers = vec![
        (USER_ID_HEADER, user_id.clone()),
        (MEMBER_ID_HEADER, user_id),
    ];
    if let Some(user) = user {
        if let Some(role) = user.challenge_role.as_deref().filter(|r| !r.is_empty()) {
            headers.push((USER_ROLES_HEADER, role.to_owned()));
        }
        if !user.nick_name.is_empty() {
            // Header values must be visible ASCII; non-ASCII nicknames are percent-encoded.
            headers.push((USER_NICKNAME_HEADER, encode_header_value(&user.nick_name)));
        }
    }
    headers
}

/// `X-MEMBER-ID` only, as the like/upload endpoints expect.
#[must_use]
pub fn member_header(user_id: Option<UserId>) -> (&'static str, String) {
    (
        MEMBER_ID_HEADER,
        user_id.unwrap_or(UserId::ANONYMOUS).to_string(),
    )
}

fn encode_header_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserProfile;

    #[test]
    fn anonymous_sends_zero() {
        let headers = identity_headers(&Session::anonymous());
        assert_eq!(
            headers,
            vec![(USER_ID_HEADER, "0".to_string()), (MEMBER_ID_HEADER, "0".to_string())]
        );
    }

    #[test]
    fn signed_user_sends_full_identity() {
        let session = Session {
            is_signed: true,
            signed_user: Some(
                UserProfile::new(UserId(9))
                    .with_nick_name("달리기")
                    .with_challenge_role("GOLD"),
            ),
        };
        let headers = identity_headers(&session);
        assert!(headers.contains(&(MEMBER_ID_HEADER, "9".to_string())));
        assert!(headers.contains(&(USER_ROLES_HEADER, "GOLD".to_string())));
        let nickname = headers
            .iter()
            .find(|(n, _)| *n == USER_NICKNAME_HEADER)
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(nickname.is_ascii());
        assert_ne!(nickname, "달리기");
    }

    #[test]
    fn member_header_defaults_to_zero() {
        assert_eq!(member_header(None), (MEMBER_ID_HEADER, "0".to_string()));
        assert_eq!(member_header(Some(UserId(4))).1, "4");
    }
}
