use axum::http::{StatusCode, request::Parts};

use satchel_core::Envelope;

use crate::dispatcher::HandlerResult;
use crate::middleware::extract_authorization_token;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Only reachable through the access gate, so the caller is authorized.
pub async fn whoami(head: Parts) -> HandlerResult {
    let token = extract_authorization_token(&head.headers);

    let mut envelope = Envelope::new().authorized(true);
    envelope.set("tokenLength", token.len());
    Ok(Some(envelope))
}
