use axum::http::request::Parts;
use serde::Deserialize;

use satchel_core::Envelope;

use crate::dispatcher::HandlerResult;

#[derive(Debug, Clone, Deserialize)]
pub struct EchoInput {
    pub id: i64,
    pub name: String,
}

/// Sends the decoded input back as `gotID` / `gotName`.
pub async fn echo(_head: Parts, input: EchoInput) -> HandlerResult {
    let mut envelope = Envelope::new();
    envelope.set("gotID", input.id).set("gotName", input.name);
    Ok(Some(envelope))
}

pub async fn hello(_head: Parts) -> HandlerResult {
    let mut envelope = Envelope::new();
    envelope.set("hello", 123);
    Ok(Some(envelope))
}

pub async fn nothing(_head: Parts) -> HandlerResult {
    Ok(None)
}
