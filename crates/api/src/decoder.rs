//! Extracting one logical input payload from a request.
//!
//! - `POST`: the whole body
//! - `GET`: taken from the query string (see [`GetPayload`])
//! - anything else: [`DispatchError::MethodNotAllowed`]
//!
//! The raw bytes are then handed to a caller-supplied parser.

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Method, Uri};
use serde::de::DeserializeOwned;

use crate::errors::DispatchError;

/// Upper bound on a `POST` payload read by the decoder.
pub const DEFAULT_BODY_LIMIT: usize = 32 << 20;

type ParseFn<T> = Arc<dyn Fn(&[u8]) -> Result<T, DispatchError> + Send + Sync>;

/// Where a `GET` request carries its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GetPayload {
    /// The literal text of the first query key, in query-string order; e.g.
    /// `GET /echo?{"id":1}` (URL-escaped) yields `{"id":1}`.
    #[default]
    FirstKey,
    /// The value of a fixed, well-known parameter; e.g. `?q=...`.
    Param(String),
}

/// Turns a request into a typed input via a parser over raw bytes.
pub struct RequestDecoder<T> {
    parser: ParseFn<T>,
    get_payload: GetPayload,
    body_limit: usize,
}

impl<T> Clone for RequestDecoder<T> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
            get_payload: self.get_payload.clone(),
            body_limit: self.body_limit,
        }
    }
}

impl<T> fmt::Debug for RequestDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDecoder")
            .field("get_payload", &self.get_payload)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl<T> RequestDecoder<T> {
    pub fn new<F>(parser: F) -> Self
    where
        F: Fn(&[u8]) -> Result<T, DispatchError> + Send + Sync + 'static,
    {
        Self {
            parser: Arc::new(parser),
            get_payload: GetPayload::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn get_payload(mut self, source: GetPayload) -> Self {
        self.get_payload = source;
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Read the raw payload and run the parser over it.
    pub async fn decode(&self, method: &Method, uri: &Uri, body: Body) -> Result<T, DispatchError> {
        let raw = raw_payload(method, uri, body, &self.get_payload, self.body_limit).await?;
        (self.parser)(&raw)
    }
}

impl<T: DeserializeOwned + 'static> RequestDecoder<T> {
    /// Decoder backed by [`json_parser`].
    pub fn json() -> Self {
        Self::new(json_parser::<T>())
    }
}

/// Parser that deserializes JSON into `T`.
pub fn json_parser<T>() -> impl Fn(&[u8]) -> Result<T, DispatchError> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    |raw: &[u8]| serde_json::from_slice(raw).map_err(|e| DispatchError::parse(e.to_string()))
}

/// Raw payload bytes for `method`. An empty query yields empty bytes.
pub async fn raw_payload(
    method: &Method,
    uri: &Uri,
    body: Body,
    source: &GetPayload,
    body_limit: usize,
) -> Result<Bytes, DispatchError> {
    match *method {
        Method::POST => axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| DispatchError::BodyRead(e.to_string())),
        Method::GET => Ok(query_payload(uri.query(), source)),
        _ => Err(DispatchError::MethodNotAllowed(method.clone())),
    }
}

/// Pick the payload out of a (still URL-encoded) query string.
pub fn query_payload(query: Option<&str>, source: &GetPayload) -> Bytes {
    let mut pairs = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes());

    let picked = match source {
        GetPayload::FirstKey => pairs.next().map(|(key, _)| key.into_owned()),
        GetPayload::Param(name) => pairs
            .find(|(key, _)| key == name.as_str())
            .map(|(_, value)| value.into_owned()),
    };

    picked.map(Bytes::from).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct MyData {
        id: i64,
        name: String,
    }

    fn escaped(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }

    #[test]
    fn first_key_is_the_payload() {
        let query = escaped(r#"{"id":123, "name":"dorival"}"#);
        let raw = query_payload(Some(&query), &GetPayload::FirstKey);
        assert_eq!(&raw[..], br#"{"id":123, "name":"dorival"}"#);
    }

    #[test]
    fn first_key_follows_query_order() {
        let raw = query_payload(Some("b=1&a=2"), &GetPayload::FirstKey);
        assert_eq!(&raw[..], b"b");
    }

    #[test]
    fn named_param_is_the_payload() {
        let source = GetPayload::Param("q".to_string());
        let raw = query_payload(Some("x=1&q=%7B%7D"), &source);
        assert_eq!(&raw[..], b"{}");
        assert!(query_payload(Some("x=1"), &source).is_empty());
    }

    #[test]
    fn empty_query_is_empty_payload() {
        assert!(query_payload(None, &GetPayload::FirstKey).is_empty());
        assert!(query_payload(Some(""), &GetPayload::FirstKey).is_empty());
    }

    #[tokio::test]
    async fn post_reads_the_body() {
        let decoder = RequestDecoder::<MyData>::json();
        let uri: Uri = "/echo".parse().unwrap();
        let got = decoder
            .decode(&Method::POST, &uri, Body::from(r#"{"id":1,"name":"a"}"#))
            .await
            .unwrap();
        assert_eq!(got, MyData { id: 1, name: "a".to_string() });
    }

    #[tokio::test]
    async fn get_reads_the_query() {
        let decoder = RequestDecoder::<MyData>::json();
        let uri: Uri = format!("/echo?{}", escaped(r#"{"id":7,"name":"b"}"#))
            .parse()
            .unwrap();
        let got = decoder.decode(&Method::GET, &uri, Body::empty()).await.unwrap();
        assert_eq!(got, MyData { id: 7, name: "b".to_string() });
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let decoder = RequestDecoder::<MyData>::json();
        let uri: Uri = "/echo".parse().unwrap();
        let err = decoder.decode(&Method::PUT, &uri, Body::empty()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed(m) if m == Method::PUT));
    }

    #[tokio::test]
    async fn parser_failures_surface() {
        let decoder = RequestDecoder::<MyData>::json();
        let uri: Uri = "/echo".parse().unwrap();
        let err = decoder
            .decode(&Method::POST, &uri, Body::from("not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Parse(_)));
    }

    #[tokio::test]
    async fn oversized_bodies_fail_to_read() {
        let decoder = RequestDecoder::<MyData>::json().body_limit(4);
        let uri: Uri = "/echo".parse().unwrap();
        let err = decoder
            .decode(&Method::POST, &uri, Body::from(r#"{"id":1,"name":"a"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::BodyRead(_)));
    }
}
