//! HTTP helpers: JSON envelope dispatch, access gating, forms, static files and
//! an outbound client, plus the demo application wiring.

pub mod app;
pub mod chain;
pub mod client;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod errors;
pub mod forms;
pub mod middleware;
pub mod static_files;

pub use chain::MiddlewareChain;
pub use client::{ApiClient, ClientError, FormMethod};
pub use config::{ConfigError, ServerConfig};
pub use decoder::{GetPayload, RequestDecoder};
pub use dispatcher::{DispatchConfig, Dispatcher, HandlerResult};
pub use errors::DispatchError;
pub use forms::{FailureMode, FormEncoding, FormError, FormOptions, FormRequest, ParseMode};
pub use middleware::{AccessGate, TokenMatch};
