//! Inbound job payload.
//!
//! A [`JobPayload`] is decoded from the JSON body of one queue message and
//! is never mutated afterwards. Producers are loosely typed, so a few fields
//! accept more than one JSON shape:
//!
//! - `prediction_uid` may be a string or a number (stringified).
//! - `user_id` may be an integer or a numeric string.
//! - empty strings count as absent for every optional string field.
//!
//! Unknown fields (e.g. `"type": "yolo_predict"`) are ignored.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::types::DbId;

/// Value of `source` selecting the local-path addressing mode.
pub const SOURCE_PATH: &str = "path";

/// One image-analysis job as received from the work queue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobPayload {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub prediction_uid: Option<String>,

    /// Object-store key of the source image.
    #[serde(default)]
    pub img: Option<String>,

    /// Addressing mode selector; only `"path"` is recognised.
    #[serde(default)]
    pub source: Option<String>,

    /// Local or shared filesystem path, used when `source == "path"`.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default, deserialize_with = "opt_id_or_numeric_string")]
    pub user_id: Option<DbId>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Where the source image of a job comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource<'a> {
    /// Object-store key, as given in `img`.
    ObjectKey(&'a str),
    /// Filesystem path, as given in `path`.
    LocalPath(&'a str),
}

impl JobPayload {
    /// Decode a payload from a raw message body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Resolve the addressing mode. `img` takes precedence over `path`.
    ///
    /// Returns `None` when neither mode is usable.
    pub fn input_source(&self) -> Option<InputSource<'_>> {
        if let Some(key) = non_empty(&self.img) {
            return Some(InputSource::ObjectKey(key));
        }
        if self.source.as_deref() == Some(SOURCE_PATH) {
            if let Some(path) = self.path.as_deref() {
                return Some(InputSource::LocalPath(path));
            }
        }
        None
    }

    pub fn prediction_uid(&self) -> Option<&str> {
        non_empty(&self.prediction_uid)
    }

    pub fn chat_id(&self) -> Option<&str> {
        non_empty(&self.chat_id)
    }

    pub fn username(&self) -> Option<&str> {
        non_empty(&self.username)
    }

    pub fn callback_url(&self) -> Option<&str> {
        non_empty(&self.callback_url)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

fn opt_id_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<DbId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("user_id {n} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<DbId>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("user_id '{s}' is not an integer"))),
        Some(other) => Err(de::Error::custom(format!(
            "expected an integer user_id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> JobPayload {
        JobPayload::from_slice(json.as_bytes()).expect("payload should decode")
    }

    #[test]
    fn object_key_mode() {
        let p = parse(r#"{"img":"photos/dog.jpg","prediction_uid":"abc","user_id":7}"#);
        assert_eq!(p.input_source(), Some(InputSource::ObjectKey("photos/dog.jpg")));
        assert_eq!(p.prediction_uid(), Some("abc"));
        assert_eq!(p.user_id, Some(7));
    }

    #[test]
    fn local_path_mode() {
        let p = parse(r#"{"source":"path","path":"/does/not/exist.jpg"}"#);
        assert_eq!(
            p.input_source(),
            Some(InputSource::LocalPath("/does/not/exist.jpg"))
        );
    }

    #[test]
    fn img_wins_over_path() {
        let p = parse(r#"{"img":"a.jpg","source":"path","path":"/b.jpg"}"#);
        assert_eq!(p.input_source(), Some(InputSource::ObjectKey("a.jpg")));
    }

    #[test]
    fn path_without_source_is_unsupported() {
        let p = parse(r#"{"path":"/b.jpg"}"#);
        assert_eq!(p.input_source(), None);
    }

    #[test]
    fn unknown_source_is_unsupported() {
        let p = parse(r#"{"source":"url","path":"http://x/b.jpg"}"#);
        assert_eq!(p.input_source(), None);
    }

    #[test]
    fn empty_img_falls_through() {
        let p = parse(r#"{"img":"","source":"path","path":"/b.jpg"}"#);
        assert_eq!(p.input_source(), Some(InputSource::LocalPath("/b.jpg")));
        let p = parse(r#"{"img":""}"#);
        assert_eq!(p.input_source(), None);
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let p = parse(
            r#"{"img":"a.jpg","prediction_uid":"","chat_id":"","username":"","callback_url":""}"#,
        );
        assert_eq!(p.prediction_uid(), None);
        assert_eq!(p.chat_id(), None);
        assert_eq!(p.username(), None);
        assert_eq!(p.callback_url(), None);
    }

    #[test]
    fn nulls_count_as_absent() {
        let p = parse(r#"{"img":"a.jpg","callback_url":null,"user_id":null,"prediction_uid":null}"#);
        assert_eq!(p.callback_url(), None);
        assert_eq!(p.user_id, None);
        assert_eq!(p.prediction_uid(), None);
    }

    #[test]
    fn numeric_uid_is_stringified() {
        let p = parse(r#"{"img":"a.jpg","prediction_uid":123}"#);
        assert_eq!(p.prediction_uid(), Some("123"));
    }

    #[test]
    fn numeric_string_user_id() {
        let p = parse(r#"{"img":"a.jpg","user_id":" 42 "}"#);
        assert_eq!(p.user_id, Some(42));
    }

    #[test]
    fn non_numeric_user_id_is_rejected() {
        let err = JobPayload::from_slice(br#"{"img":"a.jpg","user_id":"abc"}"#);
        assert_matches!(err, Err(_));
        let err = JobPayload::from_slice(br#"{"img":"a.jpg","user_id":1.5}"#);
        assert_matches!(err, Err(_));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let p = parse(r#"{"type":"yolo_predict","img":"a.jpg","extra":{"x":1}}"#);
        assert_eq!(p.img.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn non_object_body_fails() {
        assert_matches!(JobPayload::from_slice(b"not json"), Err(_));
        assert_matches!(JobPayload::from_slice(b"[1,2]"), Err(_));
    }
}
