use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use futures::{FutureExt, future::BoxFuture};

use satchel_auth::{extract_token, token_matches};
use satchel_core::render;

use crate::errors::{failure_response, json_response, panic_message};

type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;
type Fallback = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Lets a request through only when the access predicate says so.
///
/// On denial, either the fallback handler answers, or a 401 carrying
/// `{"authorized":false,"success":true}` is written.
#[derive(Clone)]
pub struct AccessGate {
    predicate: Predicate,
    fallback: Option<Fallback>,
}

impl AccessGate {
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            fallback: None,
        }
    }

    /// Hand denied requests to `fallback`, which owns status and body.
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |req: Request| fallback(req).boxed()));
        self
    }

    /// Wrap every route currently in `router`. Unmatched paths still 404.
    pub fn layer_on<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(axum::middleware::from_fn_with_state(
            self,
            access_gate_middleware,
        ))
    }
}

pub async fn access_gate_middleware(
    State(gate): State<AccessGate>,
    req: Request,
    next: Next,
) -> Response {
    if (gate.predicate)(&req) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "access denied");

    match &gate.fallback {
        Some(fallback) => fallback(req).await,
        None => json_response(StatusCode::UNAUTHORIZED, render::unauthorized()),
    }
}

/// Credential from the `Authorization` header (`Bearer <token>`), or `""` when
/// the header is missing or malformed.
pub fn extract_authorization_token(headers: &HeaderMap) -> String {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    extract_token(header).to_string()
}

/// Access predicate comparing the presented bearer token with a fixed one.
#[derive(Debug, Clone)]
pub struct TokenMatch {
    expected: String,
}

impl TokenMatch {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    pub fn allows(&self, req: &Request) -> bool {
        token_matches(&extract_authorization_token(req.headers()), &self.expected)
    }

    pub fn into_gate(self) -> AccessGate {
        AccessGate::new(move |req| self.allows(req))
    }
}

/// Turn a panic anywhere downstream into a failure envelope.
///
/// For plain axum handlers; [`Dispatcher`](crate::dispatcher::Dispatcher)
/// routes already do this themselves.
pub async fn recover_panics(req: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => {
            let msg = panic_message(payload);
            tracing::error!(panic = %msg, "handler panicked");
            failure_response(msg)
        }
    }
}

/// Permanent redirect to `https://` when a fronting proxy reports plain HTTP via
/// `x-forwarded-proto`.
pub async fn redirect_to_https(req: Request, next: Next) -> Response {
    let proto = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok());

    if !matches!(proto, Some("http") | Some("HTTP")) {
        return next.run(req).await;
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Redirect::permanent(&format!("https://{host}{path}")).into_response()
}
