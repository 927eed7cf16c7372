use axum::{Router, routing::post};

use crate::decoder::RequestDecoder;
use crate::dispatcher::{DispatchConfig, Dispatcher};

pub mod demo;
pub mod files;
pub mod system;

/// Envelope endpoints open to everyone.
pub fn public(config: DispatchConfig) -> Router {
    Router::new()
        .route(
            "/echo",
            Dispatcher::with_input(demo::echo, RequestDecoder::json())
                .config(config)
                .into_route(),
        )
        .route(
            "/hello",
            Dispatcher::without_input(demo::hello).config(config).into_route(),
        )
        .route(
            "/nothing",
            Dispatcher::without_input(demo::nothing)
                .config(config)
                .into_route(),
        )
}

/// Endpoints that sit behind the access gate.
pub fn gated(config: DispatchConfig) -> Router {
    Router::new()
        .route(
            "/whoami",
            Dispatcher::without_input(system::whoami)
                .config(config)
                .into_route(),
        )
        .route("/upload", post(files::upload))
}
