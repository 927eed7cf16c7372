//! `satchel-core`: the JSON response envelope and its canonical renderings.
//!
//! This crate has no HTTP dependencies; the `api` crate decides when and where
//! envelopes are written.

pub mod envelope;
pub mod error;
pub mod render;

pub use envelope::Envelope;
pub use error::{EnvelopeError, EnvelopeResult};
