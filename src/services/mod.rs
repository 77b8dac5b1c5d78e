//! Thin consumers of the request pipeline, one module per backend resource.
//!
//! They shape requests, reshape responses into consistent structs, and keep
//! small local caches in sync. Backend payloads are not uniform across
//! services (`result` vs `data` envelopes, renamed fields, numbers sent as
//! strings), so normalization goes through the helpers below.

pub mod community;
pub mod notification;
pub mod pointshop;
pub mod user;

use serde_json::Value as JsonValue;

use crate::error::Error;

/// Inner payload of a `{ result: .. }` or `{ data: .. }` envelope, or the value itself.
pub(crate) fn payload(value: &JsonValue) -> &JsonValue {
    ["result", "data"]
        .into_iter()
        .filter_map(|key| value.get(key))
        .find(|v| !v.is_null())
        .unwrap_or(value)
}

/// Integer from a JSON number or a numeric string (thousands separators allowed).
pub(crate) fn as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// First of `keys` present on `value` that is not null.
pub(crate) fn field<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

pub(crate) fn str_field(value: &JsonValue, keys: &[&str]) -> Option<String> {
    field(value, keys).and_then(|v| match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn i64_field(value: &JsonValue, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(as_i64)
}

pub(crate) fn bool_field(value: &JsonValue, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(JsonValue::as_bool)
}

/// Array items from a bare array or a paged `{ content: [..] }` object.
pub(crate) fn items(value: &JsonValue) -> &[JsonValue] {
    value
        .as_array()
        .or_else(|| value.get("content").and_then(JsonValue::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn shape_error(what: &str) -> Error {
    Error::Decode(<serde_json::Error as serde::de::Error>::custom(what))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_unwraps_known_envelopes() {
        assert_eq!(payload(&json!({ "result": { "a": 1 } })), &json!({ "a": 1 }));
        assert_eq!(payload(&json!({ "data": [1] })), &json!([1]));
        assert_eq!(payload(&json!({ "result": null, "data": 2 })), &json!(2));
        assert_eq!(payload(&json!([3])), &json!([3]));
    }

    #[test]
    fn numbers_from_strings() {
        assert_eq!(as_i64(&json!("1,200")), Some(1200));
        assert_eq!(as_i64(&json!(" 5 ")), Some(5));
        assert_eq!(as_i64(&json!(3.0)), Some(3));
        assert_eq!(as_i64(&json!("abc")), None);
        assert_eq!(as_i64(&json!(null)), None);
    }

    #[test]
    fn first_present_field_wins() {
        let v = json!({ "like": null, "likeCount": 4, "likes": "x" });
        assert_eq!(i64_field(&v, &["likes", "like", "likeCount"]), Some(4));
        assert_eq!(str_field(&json!({ "id": 9 }), &["postId", "id"]).as_deref(), Some("9"));
    }

    #[test]
    fn items_from_page_or_array() {
        assert_eq!(items(&json!([1, 2])).len(), 2);
        assert_eq!(items(&json!({ "content": [1] })).len(), 1);
        assert!(items(&json!({ "other": 1 })).is_empty());
    }
}
