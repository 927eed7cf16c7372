//! Fatal request conditions and their conversion into envelope responses.

use std::any::Any;
use std::fmt::Display;

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use satchel_core::{EnvelopeError, render};

/// A condition that aborts the current request.
///
/// Everything below a [`Dispatcher`](crate::dispatcher::Dispatcher) returns this
/// instead of panicking; the dispatcher is the one place that turns it into a
/// failure envelope. The `Display` text becomes the envelope's `error` member.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("only GET and POST are supported; got {0}")]
    MethodNotAllowed(Method),

    #[error("cannot read request body: {0}")]
    BodyRead(String),

    #[error("cannot parse input: {0}")]
    Parse(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Raised by business handlers; rendered verbatim.
    #[error("{0}")]
    Handler(String),
}

impl DispatchError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

/// Write an already-rendered envelope with the JSON content type.
pub fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response()
}

/// Failure envelope response.
///
/// Status stays 200: clients read `success`, not the status line, for
/// handler-level failures.
pub fn failure_response(err: impl Display) -> Response {
    json_response(StatusCode::OK, render::failed(err))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "handler panicked".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_errors_render_verbatim() {
        assert_eq!(DispatchError::handler("boom").to_string(), "boom");
    }

    #[test]
    fn envelope_errors_are_transparent() {
        let err: DispatchError = EnvelopeError::OddPairs(3).into();
        assert_eq!(err.to_string(), EnvelopeError::OddPairs(3).to_string());
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(Box::new("static str")), "static str");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "handler panicked");
    }

    #[tokio::test]
    async fn failure_response_is_json_with_ok_status() {
        let res = failure_response("nope");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            &body[..],
            br#"{"authorized":false,"success":false,"error":"nope"}"#
        );
    }
}
