//! Validation requests as they arrive over the wire.
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InputError;
use crate::types::{parse_timestamp, SchemeKind, WorkClaim};

/// A token to check, tagged by scheme:
///
/// ```json
/// {"scheme": "session", "id": "job-42", "created": 1700000000, "value": "...",
///  "token": "...", "session_key": "...", "sub": "worker-7", "model": "m", "revision": "r1"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum TokenRequest {
    Legacy(LegacyRequest),
    Session(SessionRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRequest {
    pub id: String,
    #[serde(deserialize_with = "deserialize_created")]
    pub created: u64,
    #[serde(default)]
    pub value: String,
    pub hash: String,
    pub salt: String,
    pub model: String,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub id: String,
    #[serde(deserialize_with = "deserialize_created")]
    pub created: u64,
    #[serde(default)]
    pub value: String,
    pub token: String,
    pub session_key: String,
    pub sub: String,
    pub model: String,
    pub revision: String,
}

impl TokenRequest {
    /// Parse a JSON request. `created` is classified before the struct is
    /// built, so a bad timestamp is always `InvalidTimestamp`.
    pub fn from_json(input: &str) -> Result<Self, InputError> {
        let mut value: Value = serde_json::from_str(input)
            .map_err(|err| InputError::InvalidRequest(err.to_string()))?;
        if let Some(created) = value.get_mut("created") {
            *created = Value::from(created_timestamp(created)?);
        }
        serde_json::from_value(value).map_err(|err| InputError::InvalidRequest(err.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> SchemeKind {
        match self {
            TokenRequest::Legacy(_) => SchemeKind::Legacy,
            TokenRequest::Session(_) => SchemeKind::Session,
        }
    }

    pub fn claim(&self) -> WorkClaim<'_> {
        match self {
            TokenRequest::Legacy(r) => WorkClaim::new(&r.id, r.created, &r.value),
            TokenRequest::Session(r) => WorkClaim::new(&r.id, r.created, &r.value),
        }
    }
}

fn created_timestamp(value: &Value) -> Result<u64, InputError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| InputError::InvalidTimestamp(n.to_string())),
        Value::String(text) => parse_timestamp(text),
        other => Err(InputError::InvalidTimestamp(other.to_string())),
    }
}

/// `created` may be a JSON integer or a decimal string.
fn deserialize_created<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Created {
        Int(u64),
        Text(String),
    }

    match Created::deserialize(deserializer)? {
        Created::Int(ts) => Ok(ts),
        Created::Text(text) => parse_timestamp(&text).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_request() {
        let req = TokenRequest::from_json(
            r#"{"scheme":"session","id":"job-42","created":1700000000,"value":"hello world",
                "token":"687b46145a10da0e8f4cb4f4d5097098","session_key":"00",
                "sub":"worker-7","model":"llama-3-8b","revision":"r1"}"#,
        )
        .expect("session request");
        assert_eq!(req.kind(), SchemeKind::Session);
        assert_eq!(req.claim(), WorkClaim::new("job-42", 1_700_000_000, "hello world"));
    }

    #[test]
    fn parses_legacy_request_with_string_timestamp_and_no_value() {
        let req = TokenRequest::from_json(
            r#"{"scheme":"legacy","id":"job-1","created":"1700000000",
                "hash":"8d44c43167de003391430192786631e0","salt":"pepper",
                "model":"llama-3-8b","revision":"r1"}"#,
        )
        .expect("legacy request");
        assert_eq!(req.kind(), SchemeKind::Legacy);
        assert_eq!(req.claim(), WorkClaim::new("job-1", 1_700_000_000, ""));
    }

    #[test]
    fn non_numeric_timestamp_is_an_input_error() {
        let err = TokenRequest::from_json(
            r#"{"scheme":"legacy","id":"job-1","created":"noon","hash":"","salt":"",
                "model":"","revision":""}"#,
        )
        .expect_err("bad timestamp");
        assert_eq!(err, InputError::InvalidTimestamp("noon".into()));

        let err = TokenRequest::from_json(
            r#"{"scheme":"legacy","id":"job-1","created":-3,"hash":"","salt":"",
                "model":"","revision":""}"#,
        )
        .expect_err("negative timestamp");
        assert_eq!(err, InputError::InvalidTimestamp("-3".into()));
    }

    #[test]
    fn timestamp_text_is_reported_verbatim() {
        let err = TokenRequest::from_json(
            r#"{"scheme":"session","id":"job-1","created":"noon at line 3 column 9",
                "token":"","session_key":"","sub":"","model":"","revision":""}"#,
        )
        .expect_err("bad timestamp");
        assert_eq!(
            err,
            InputError::InvalidTimestamp("noon at line 3 column 9".into())
        );

        let err = TokenRequest::from_json(
            r#"{"scheme":"legacy","id":"job-1","created":1.5,"hash":"","salt":"",
                "model":"","revision":""}"#,
        )
        .expect_err("fractional timestamp");
        assert_eq!(err, InputError::InvalidTimestamp("1.5".into()));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = TokenRequest::from_json(r#"{"scheme":"v3","id":"x"}"#).expect_err("v3");
        assert!(matches!(err, InputError::InvalidRequest(_)));
    }

    #[test]
    fn json_round_trip() {
        let req = TokenRequest::Session(SessionRequest {
            id: "job".into(),
            created: 7,
            value: String::new(),
            token: "t".into(),
            session_key: "k".into(),
            sub: "s".into(),
            model: "m".into(),
            revision: "r".into(),
        });
        assert_eq!(TokenRequest::from_json(&req.to_json().unwrap()), Ok(req));
    }
}
