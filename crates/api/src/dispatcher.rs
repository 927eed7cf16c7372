//! Panic-safe JSON handler wrapper.
//!
//! Per request:
//!
//! ```text
//! CORS + content-type -> method check -> decode (optional) -> handler
//!     -> Some(envelope): success forced true, rendered
//!     -> None:           {"authorized":false,"success":true}
//!     -> Err / panic:    {"authorized":false,"success":false,"error":"..."}
//! ```
//!
//! Nothing raised below [`Dispatcher::serve`] escapes it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::Instrument;
use uuid::Uuid;

use satchel_core::{Envelope, render};

use crate::decoder::RequestDecoder;
use crate::errors::{DispatchError, panic_message};

/// What a business handler produces: an envelope, nothing (treated as
/// "not authorized, but fine"), or a fatal condition.
pub type HandlerResult = Result<Option<Envelope>, DispatchError>;

type InputHandler<T> = Arc<dyn Fn(Parts, T) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type PlainHandler = Arc<dyn Fn(Parts) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Log every rendered body at debug level. Has no effect on responses.
    pub verbose: bool,
}

enum Stage<T> {
    Decode(RequestDecoder<T>, InputHandler<T>),
    Plain(PlainHandler),
}

impl<T> Clone for Stage<T> {
    fn clone(&self) -> Self {
        match self {
            Stage::Decode(decoder, handler) => Stage::Decode(decoder.clone(), Arc::clone(handler)),
            Stage::Plain(handler) => Stage::Plain(Arc::clone(handler)),
        }
    }
}

/// Wraps a business handler so every request gets a well-formed envelope back.
pub struct Dispatcher<T = ()> {
    stage: Stage<T>,
    config: DispatchConfig,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage.clone(),
            config: self.config,
        }
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Handler that receives the decoded input.
    pub fn with_input<F, Fut>(handler: F, decoder: RequestDecoder<T>) -> Self
    where
        F: Fn(Parts, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: InputHandler<T> = Arc::new(move |head: Parts, input: T| handler(head, input).boxed());
        Self {
            stage: Stage::Decode(decoder, handler),
            config: DispatchConfig::default(),
        }
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one request through the pipeline. Always produces a JSON response.
    pub async fn serve(&self, req: Request) -> Response {
        let (head, body) = req.into_parts();
        let headers = response_headers(&head.headers);

        let request_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "dispatch",
            %request_id,
            method = %head.method,
            path = %head.uri.path(),
        );

        let outcome = AssertUnwindSafe(self.run(head, body).instrument(span.clone()))
            .catch_unwind()
            .await;

        let body = span.in_scope(|| match outcome {
            Ok(Ok(Some(mut envelope))) => {
                envelope.mark_success();
                envelope.to_json()
            }
            Ok(Ok(None)) => render::unauthorized(),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "request failed");
                render::failed(&err)
            }
            Err(payload) => {
                let msg = panic_message(payload);
                tracing::error!(panic = %msg, "handler panicked");
                render::failed(msg)
            }
        });

        if self.config.verbose {
            tracing::debug!(%request_id, %body, "response rendered");
        }

        (StatusCode::OK, headers, body).into_response()
    }

    /// Mount as an axum route accepting any method; non-GET/POST requests get a
    /// failure envelope.
    pub fn into_route<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        any(move |req: Request| async move { self.serve(req).await })
    }

    async fn run(&self, head: Parts, body: Body) -> HandlerResult {
        if head.method != Method::GET && head.method != Method::POST {
            return Err(DispatchError::MethodNotAllowed(head.method));
        }

        match &self.stage {
            Stage::Decode(decoder, handler) => {
                let input = decoder.decode(&head.method, &head.uri, body).await?;
                handler(head, input).await
            }
            Stage::Plain(handler) => handler(head).await,
        }
    }
}

impl Dispatcher<()> {
    /// Handler that needs no structured input; the body is never read.
    pub fn without_input<F, Fut>(handler: F) -> Self
    where
        F: Fn(Parts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: PlainHandler = Arc::new(move |head: Parts| handler(head).boxed());
        Self {
            stage: Stage::Plain(handler),
            config: DispatchConfig::default(),
        }
    }
}

/// Permissive CORS (origin echoed verbatim) plus JSON content type.
fn response_headers(request: &HeaderMap) -> HeaderMap {
    let origin = request
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(""));

    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct MyData {
        id: i64,
        name: String,
    }

    async fn echo(_head: Parts, input: MyData) -> HandlerResult {
        let mut envelope = Envelope::new();
        envelope.set("gotID", input.id).set("gotName", input.name);
        Ok(Some(envelope))
    }

    fn echo_app() -> Router {
        Router::new().route(
            "/",
            Dispatcher::with_input(echo, RequestDecoder::json()).into_route(),
        )
    }

    async fn call(app: Router, req: Request) -> (StatusCode, HeaderMap, String) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    fn post(uri: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn post_input_is_decoded() {
        let (status, _, body) = call(echo_app(), post("/", r#"{"id":123, "name":"dorival"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"authorized":false,"gotID":123,"gotName":"dorival","success":true}"#
        );
    }

    #[tokio::test]
    async fn get_input_is_decoded_from_first_key() {
        let query: String =
            url::form_urlencoded::byte_serialize(br#"{"id":123, "name":"dorival"}"#).collect();
        let (_, _, body) = call(echo_app(), get(&format!("/?{query}"))).await;
        assert_eq!(
            body,
            r#"{"authorized":false,"gotID":123,"gotName":"dorival","success":true}"#
        );
    }

    #[tokio::test]
    async fn parse_failure_becomes_failure_envelope() {
        let (status, headers, body) = call(echo_app(), post("/", "{")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let env = Envelope::from_json(body.as_bytes()).unwrap();
        assert!(!env.is_success());
        assert!(env.error().unwrap().starts_with("cannot parse input"));
    }

    #[tokio::test]
    async fn other_methods_fail_but_keep_headers() {
        let req = axum::http::Request::builder()
            .method(Method::PUT)
            .uri("/")
            .header(header::ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = call(echo_app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://example.com"
        );
        assert_eq!(
            body,
            r#"{"authorized":false,"success":false,"error":"only GET and POST are supported; got PUT"}"#
        );
    }

    #[tokio::test]
    async fn output_without_input() {
        let app = Router::new().route(
            "/",
            Dispatcher::without_input(|_head| async {
                let mut envelope = Envelope::new();
                envelope.set("hello", 123);
                Ok(Some(envelope))
            })
            .into_route(),
        );
        let (_, _, body) = call(app.clone(), get("/")).await;
        assert_eq!(body, r#"{"authorized":false,"hello":123,"success":true}"#);
        let (_, _, body) = call(app, post("/", "")).await;
        assert_eq!(body, r#"{"authorized":false,"hello":123,"success":true}"#);
    }

    #[tokio::test]
    async fn no_envelope_means_unauthorized_but_successful() {
        let app = Router::new().route(
            "/",
            Dispatcher::without_input(|_head| async { Ok(None) }).into_route(),
        );
        let (_, _, body) = call(app, get("/")).await;
        assert_eq!(body, r#"{"authorized":false,"success":true}"#);
    }

    #[tokio::test]
    async fn handler_errors_become_failure_envelopes() {
        let app = Router::new().route(
            "/",
            Dispatcher::without_input(|_head| async {
                Err(DispatchError::handler("jhandler04 wants to stop"))
            })
            .into_route(),
        );
        let (_, _, body) = call(app, post("/", "")).await;
        assert_eq!(
            body,
            r#"{"authorized":false,"success":false,"error":"jhandler04 wants to stop"}"#
        );
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let app = Router::new().route(
            "/",
            Dispatcher::without_input(|head: Parts| async move {
                if head.uri.query() == Some("explode") {
                    panic!("boom");
                }
                Ok(Some(Envelope::new().authorized(true)))
            })
            .into_route(),
        );

        let (status, _, body) = call(app.clone(), get("/?explode")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"authorized":false,"success":false,"error":"boom"}"#);

        let (_, _, body) = call(app, get("/")).await;
        assert_eq!(body, r#"{"authorized":true,"success":true}"#);
    }

    #[tokio::test]
    async fn success_is_forced_even_if_handler_leaves_it_unset() {
        let app = Router::new().route(
            "/",
            Dispatcher::without_input(|_head| async { Ok(Some(Envelope::new())) })
                .config(DispatchConfig { verbose: true })
                .into_route(),
        );
        let (_, _, body) = call(app, get("/")).await;
        assert_eq!(body, r#"{"authorized":false,"success":true}"#);
    }

    #[test]
    fn missing_origin_echoes_empty() {
        let headers = response_headers(&HeaderMap::new());
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }
}
