//! Canonical envelope strings.
//!
//! Templated directly; member order is always `authorized`, `success`, then
//! `error` or `data`.

use std::fmt::Display;

use serde_json::Value;

use crate::error::{EnvelopeError, EnvelopeResult};

/// `{"authorized":false,"success":false,"error":"<message>"}`
pub fn failed(err: impl Display) -> String {
    format!(
        r#"{{"authorized":false,"success":false,"error":{}}}"#,
        quote(&err.to_string())
    )
}

/// `{"authorized":false,"success":true}`
///
/// The request went through, the caller just wasn't let in (or the handler chose
/// not to produce a result).
pub fn unauthorized() -> String {
    r#"{"authorized":false,"success":true}"#.to_string()
}

/// `{"authorized":true,"success":true}`
pub fn all_good() -> String {
    r#"{"authorized":true,"success":true}"#.to_string()
}

/// `{"authorized":true,"success":true,"data":{...}}` from a flat, alternating
/// key/value list such as `["k1", "v1", "k2", 2]`.
///
/// Keys must be strings. String values are quoted; everything else renders as its
/// JSON form. Member order follows the input.
pub fn all_good_with_data(items: &[Value]) -> EnvelopeResult<String> {
    if items.len() % 2 != 0 {
        return Err(EnvelopeError::OddPairs(items.len()));
    }

    let mut members = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks_exact(2) {
        let Value::String(key) = &pair[0] else {
            return Err(EnvelopeError::InvalidKey(pair[0].to_string()));
        };
        members.push(member(key, &pair[1]));
    }

    Ok(wrap_data(&members.join(",")))
}

/// Typed variant of [`all_good_with_data`]; pairs can't be unbalanced so this
/// never fails.
pub fn all_good_with_pairs(pairs: &[(&str, Value)]) -> String {
    let members: Vec<String> = pairs.iter().map(|(k, v)| member(k, v)).collect();
    wrap_data(&members.join(","))
}

/// `{"authorized":true,"success":true,"data":<raw>}` with `raw` inserted verbatim.
///
/// `raw` is expected to already be a JSON object literal.
pub fn all_good_with_data_string(raw: &str) -> String {
    format!(r#"{{"authorized":true,"success":true,"data":{raw}}}"#)
}

fn wrap_data(members: &str) -> String {
    format!(r#"{{"authorized":true,"success":true,"data":{{{members}}}}}"#)
}

fn member(key: &str, value: &Value) -> String {
    format!("{}:{}", quote(key), value)
}

fn quote(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}
