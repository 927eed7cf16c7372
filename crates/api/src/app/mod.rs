//! HTTP application wiring.
//!
//! - `routes/`: demo handlers, one file per area
//! - [`build_app`]: assembles public routes, gated routes, static files and the
//!   outer middleware chain

use axum::{Extension, Router, extract::DefaultBodyLimit, routing::get};

use crate::chain::MiddlewareChain;
use crate::config::ServerConfig;
use crate::forms::MAX_MULTIPART_MEMORY;
use crate::middleware::TokenMatch;
use crate::static_files::{StaticMountError, mount_static};

pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ServerConfig) -> Result<Router, StaticMountError> {
    let dispatch = config.dispatch();

    // Gated routes: bearer token must match the configured one.
    let gated = MiddlewareChain::new()
        .with_gate(TokenMatch::new(config.effective_access_token()).into_gate())
        .layer(DefaultBodyLimit::max(MAX_MULTIPART_MEMORY))
        .apply(routes::gated(dispatch))
        .layer(Extension(routes::files::UploadDir(config.upload_dir.clone())));

    let mut app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public(dispatch))
        .merge(gated);

    if let Some(dir) = &config.static_dir {
        app = mount_static(app, "/", dir)?;
    }

    let mut outer = MiddlewareChain::new();
    if config.force_https {
        outer = outer.with_https_redirect();
    }

    Ok(outer.with_panic_recovery().apply(app))
}
