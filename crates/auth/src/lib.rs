//! `satchel-auth`: credential helpers shared by access gates.
//!
//! Free of HTTP types: callers hand in raw header values.

pub mod token;

pub use token::{extract_token, token_matches};
