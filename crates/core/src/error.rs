//! Envelope error model.

use thiserror::Error;

/// Result type used by envelope construction and parsing.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Failure while building, rendering, or parsing a response envelope.
///
/// The `Display` text of every variant ends up in the `error` member of a failure
/// envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Input bytes were not valid JSON.
    #[error("cannot parse JSON data: {0}")]
    Parse(String),

    /// Input was valid JSON but the top level was not an object.
    #[error("cannot parse JSON data: expected an object at the top level")]
    NotAnObject,

    /// `authorized` or `success` was present but not a boolean.
    #[error("cannot parse JSON data: member {0:?} must be a boolean")]
    InvalidFlag(&'static str),

    /// A typed value could not be converted into a JSON value.
    #[error("cannot serialize value for key {key:?}: {message}")]
    Serialize { key: String, message: String },

    /// Key/value list passed to a data renderer had an odd number of items.
    #[error("number of items in data must be even; got {0}")]
    OddPairs(usize),

    /// A key in a key/value list was not a string.
    #[error("data keys must be strings; got {0}")]
    InvalidKey(String),
}

impl EnvelopeError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn serialize(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialize {
            key: key.into(),
            message: msg.into(),
        }
    }
}
