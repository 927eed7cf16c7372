//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Log volume settings, passed explicitly instead of living in a global.
///
/// `verbose` only raises the default filter to `debug`; nothing else in the
/// workspace reads it for behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub verbose: bool,
    pub json: bool,
}

impl LogConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn default_directive(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Initialize tracing/logging for the process.
///
/// `RUST_LOG` wins over the config's default directive.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    // try_init: a second call (tests, embedded use) keeps the first subscriber.
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
