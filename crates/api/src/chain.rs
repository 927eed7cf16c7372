//! Ordered middleware composition.
//!
//! Stages are listed outermost first: in `chain.then(a).then(b)`, `a` sees the
//! request before `b` does, and `b` sees the response first.

use std::convert::Infallible;

use axum::Router;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::Route;
use tower::{Layer, Service};

use crate::middleware::{AccessGate, recover_panics, redirect_to_https};

type Stage<S> = Box<dyn FnOnce(Router<S>) -> Router<S> + Send>;

pub struct MiddlewareChain<S = ()> {
    stages: Vec<Stage<S>>,
}

impl<S> Default for MiddlewareChain<S> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<S> MiddlewareChain<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Append a stage that wraps everything appended after it.
    pub fn then<F>(mut self, stage: F) -> Self
    where
        F: FnOnce(Router<S>) -> Router<S> + Send + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append any tower layer accepted by [`Router::layer`].
    pub fn layer<L>(self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.then(move |router| router.layer(layer))
    }

    pub fn with_gate(self, gate: AccessGate) -> Self {
        self.then(move |router| gate.layer_on(router))
    }

    pub fn with_panic_recovery(self) -> Self {
        self.layer(axum::middleware::from_fn(recover_panics))
    }

    pub fn with_https_redirect(self) -> Self {
        self.layer(axum::middleware::from_fn(redirect_to_https))
    }

    /// Wrap `router`, innermost stage first so the first stage ends up outermost.
    pub fn apply(self, router: Router<S>) -> Router<S> {
        self.stages
            .into_iter()
            .rev()
            .fold(router, |router, stage| stage(router))
    }
}
