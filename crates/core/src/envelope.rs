//! The JSON result envelope returned by every wrapped handler.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::render;

const AUTHORIZED: &str = "authorized";
const SUCCESS: &str = "success";
const ERROR: &str = "error";

/// Per-request result: access/success flags plus an optional flat payload.
///
/// A fresh envelope is built for each request, filled in by the handler, and
/// rendered once with [`Envelope::to_json`]. When `data` is non-empty the flags
/// are merged into the same JSON object as the payload members:
///
/// ```text
/// {"authorized":false,"gotID":123,"gotName":"dorival","success":true}
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    authorized: bool,
    success: bool,
    data: Map<String, Value>,
    error: Option<String>,
}

impl Envelope {
    /// Not authorized, not (yet) successful, no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure envelope carrying `message` as its `error` member.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Builder-style variant of [`Envelope::set_authorized`].
    pub fn authorized(mut self, authorized: bool) -> Self {
        self.authorized = authorized;
        self
    }

    pub fn set_authorized(&mut self, authorized: bool) {
        self.authorized = authorized;
    }

    /// Marks the request as completed. Dispatchers call this themselves; handlers
    /// don't need to.
    pub fn mark_success(&mut self) {
        self.success = true;
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Insert or overwrite a payload member. Last write wins.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Like [`Envelope::set`], for any `Serialize` value.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> EnvelopeResult<&mut Self> {
        let key = key.into();
        let value =
            serde_json::to_value(value).map_err(|e| EnvelopeError::serialize(&key, e.to_string()))?;
        self.data.insert(key, value);
        Ok(self)
    }

    /// Render the envelope.
    ///
    /// - with an error: the canonical failure shape
    /// - without data: `{"authorized":<a>,"success":<b>}`
    /// - with data: flags merged into the payload object (members sorted by key)
    ///
    /// Never fails: a payload that can't be encoded yields a failure envelope
    /// describing why.
    pub fn to_json(&self) -> String {
        if let Some(err) = &self.error {
            return render::failed(err);
        }

        if self.data.is_empty() {
            return format!(
                r#"{{"{AUTHORIZED}":{},"{SUCCESS}":{}}}"#,
                self.authorized, self.success
            );
        }

        let mut merged = self.data.clone();
        merged.insert(AUTHORIZED.to_string(), Value::Bool(self.authorized));
        merged.insert(SUCCESS.to_string(), Value::Bool(self.success));

        match serde_json::to_string(&merged) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "envelope payload could not be serialized");
                render::failed(e)
            }
        }
    }

    /// Parse an envelope previously produced by [`Envelope::to_json`] (or any JSON
    /// object). `authorized`/`success` become the flags and every other top-level
    /// member lands in `data`.
    ///
    /// Only the canonical failure shape (both flags false, a string `error`, nothing
    /// else) yields an error envelope; any other `error` member is payload.
    pub fn from_json(bytes: &[u8]) -> EnvelopeResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::parse(e.to_string()))?;

        let Value::Object(mut members) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let authorized = take_flag(&mut members, AUTHORIZED)?;
        let success = take_flag(&mut members, SUCCESS)?;

        let failure_shape = !authorized && !success && members.len() == 1;
        let error = match members.get(ERROR) {
            Some(Value::String(_)) if failure_shape => match members.remove(ERROR) {
                Some(Value::String(msg)) => Some(msg),
                _ => None,
            },
            _ => None,
        };

        Ok(Self {
            authorized,
            success,
            data: members,
            error,
        })
    }
}

fn take_flag(members: &mut Map<String, Value>, name: &'static str) -> EnvelopeResult<bool> {
    match members.remove(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(_) => Err(EnvelopeError::InvalidFlag(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_envelope_has_no_access_and_no_success() {
        let env = Envelope::new();
        assert!(!env.is_authorized());
        assert!(!env.is_success());
        assert!(env.data().is_empty());
        assert_eq!(env.to_json(), r#"{"authorized":false,"success":false}"#);
    }

    #[test]
    fn flags_without_data() {
        let mut env = Envelope::new().authorized(true);
        env.mark_success();
        assert_eq!(env.to_json(), r#"{"authorized":true,"success":true}"#);
    }

    #[test]
    fn data_is_merged_flat_and_sorted() {
        let mut env = Envelope::new();
        env.set("gotName", "dorival").set("gotID", 123);
        env.mark_success();
        assert_eq!(
            env.to_json(),
            r#"{"authorized":false,"gotID":123,"gotName":"dorival","success":true}"#
        );
    }

    #[test]
    fn set_is_last_write_wins() {
        let mut env = Envelope::new();
        env.set("k", 1).set("k", "two");
        assert_eq!(env.data().len(), 1);
        assert_eq!(env.get("k"), Some(&json!("two")));
    }

    #[test]
    fn to_json_does_not_mutate_data() {
        let mut env = Envelope::new();
        env.set("k", 1);
        let _ = env.to_json();
        assert_eq!(env.data().len(), 1);
        assert!(env.get(AUTHORIZED).is_none());
    }

    #[test]
    fn failure_renders_canonical_shape() {
        let env = Envelope::failure("boom");
        assert_eq!(
            env.to_json(),
            r#"{"authorized":false,"success":false,"error":"boom"}"#
        );
    }

    #[test]
    fn set_serialized_accepts_structs() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let mut env = Envelope::new();
        env.set_serialized("p", &Point { x: 1, y: 2 }).unwrap();
        assert_eq!(env.get("p"), Some(&json!({"x": 1, "y": 2})));
    }

    #[test]
    fn set_serialized_reports_key_on_failure() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], 1);

        let err = Envelope::new().set_serialized("bad", &bad).unwrap_err();
        assert!(matches!(err, EnvelopeError::Serialize { ref key, .. } if key == "bad"));
    }

    #[test]
    fn from_json_reads_flags_and_siblings() {
        let env =
            Envelope::from_json(br#"{"authorized":true,"success":true,"hello":123}"#).unwrap();
        assert!(env.is_authorized());
        assert!(env.is_success());
        assert_eq!(env.get("hello"), Some(&json!(123)));
        assert_eq!(env.data().len(), 1);
    }

    #[test]
    fn from_json_reads_error() {
        let env = Envelope::from_json(
            br#"{"authorized":false,"success":false,"error":"jhandler04 wants to stop"}"#,
        )
        .unwrap();
        assert_eq!(env.error(), Some("jhandler04 wants to stop"));
        assert!(env.data().is_empty());
    }

    #[test]
    fn error_member_of_a_successful_envelope_stays_in_data() {
        let mut env = Envelope::new().authorized(true);
        env.set("error", "none");
        env.mark_success();

        let json = env.to_json();
        assert_eq!(json, r#"{"authorized":true,"error":"none","success":true}"#);

        let parsed = Envelope::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed.error(), None);
        assert_eq!(parsed.data(), env.data());
        assert_eq!(parsed.to_json(), json);
    }

    #[test]
    fn error_member_next_to_other_data_stays_in_data() {
        let env = Envelope::from_json(br#"{"success":false,"error":"x","k":1}"#).unwrap();
        assert_eq!(env.error(), None);
        assert_eq!(env.get("error"), Some(&json!("x")));
        assert_eq!(env.get("k"), Some(&json!(1)));
    }

    #[test]
    fn from_json_missing_flags_default_false() {
        let env = Envelope::from_json(br#"{"k":"v"}"#).unwrap();
        assert!(!env.is_authorized());
        assert!(!env.is_success());
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            Envelope::from_json(b"not json"),
            Err(EnvelopeError::Parse(_))
        ));
        assert_eq!(
            Envelope::from_json(b"[1,2,3]"),
            Err(EnvelopeError::NotAnObject)
        );
        assert_eq!(
            Envelope::from_json(br#"{"authorized":"yes"}"#),
            Err(EnvelopeError::InvalidFlag("authorized"))
        );
    }
}
