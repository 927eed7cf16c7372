//! Serving a directory of static files under a URL prefix.

use std::path::Path;

use axum::Router;
use thiserror::Error;
use tower_http::services::ServeDir;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StaticMountError {
    #[error("static path {0:?} must not contain route parameters or wildcards")]
    PathParams(String),

    #[error("static path {0:?} must start with '/'")]
    Relative(String),
}

/// Serve files under `root` at `path`; `/` (or an empty path) mounts as the
/// router's fallback so explicit routes still win.
pub fn mount_static<S>(
    router: Router<S>,
    path: &str,
    root: impl AsRef<Path>,
) -> Result<Router<S>, StaticMountError>
where
    S: Clone + Send + Sync + 'static,
{
    if path.contains(['{', '}', '*', ':']) {
        return Err(StaticMountError::PathParams(path.to_string()));
    }

    let trimmed = path.trim_end_matches('/');
    let files = ServeDir::new(root.as_ref());

    if trimmed.is_empty() {
        tracing::debug!(root = %root.as_ref().display(), "static files mounted at /");
        return Ok(router.fallback_service(files));
    }
    if !trimmed.starts_with('/') {
        return Err(StaticMountError::Relative(path.to_string()));
    }

    tracing::debug!(path = trimmed, root = %root.as_ref().display(), "static files mounted");
    Ok(router.nest_service(trimmed, files))
}
