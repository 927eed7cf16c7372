//! Credential extraction from `Authorization` header values.

/// Return the credential from an `Authorization` header value such as
/// `Bearer abc123` or `Basic dXNlcjpwYXNz`.
///
/// The scheme word is not checked; only the second of exactly two
/// single-space-separated words is returned. A missing header or any other shape
/// yields `""`, which callers must read as "no credential presented".
pub fn extract_token(header: Option<&str>) -> &str {
    let Some(header) = header else {
        return "";
    };

    let mut words = header.split(' ');
    match (words.next(), words.next(), words.next()) {
        (Some(_scheme), Some(token), None) => token,
        _ => "",
    }
}

/// Access decision against a single expected credential.
///
/// An empty expected token never matches, so an unset secret can't open a gate.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() || presented.len() != expected.len() {
        return false;
    }

    presented
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
