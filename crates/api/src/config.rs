//! Server settings read from `SATCHEL_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use satchel_observability::LogConfig;
use thiserror::Error;

use crate::dispatcher::DispatchConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
/// Only ever used when `SATCHEL_ACCESS_TOKEN` is unset.
pub const DEV_ACCESS_TOKEN: &str = "dev-token";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub verbose: bool,
    /// `None` means "not configured"; see [`ServerConfig::effective_access_token`].
    pub access_token: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub upload_dir: PathBuf,
    pub force_https: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            verbose: false,
            access_token: None,
            static_dir: None,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            force_https: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = get("SATCHEL_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "SATCHEL_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        Ok(Self {
            bind_addr,
            verbose: parse_flag("SATCHEL_VERBOSE", get("SATCHEL_VERBOSE"))?,
            access_token: get("SATCHEL_ACCESS_TOKEN"),
            static_dir: get("SATCHEL_STATIC_DIR").map(PathBuf::from),
            upload_dir: get("SATCHEL_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            force_https: parse_flag("SATCHEL_FORCE_HTTPS", get("SATCHEL_FORCE_HTTPS"))?,
        })
    }

    /// The configured token, or the insecure dev default.
    pub fn effective_access_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(DEV_ACCESS_TOKEN)
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            verbose: self.verbose,
        }
    }

    pub fn log(&self) -> LogConfig {
        LogConfig::default().verbose(self.verbose)
    }
}

fn parse_flag(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(false),
        Some(value) => value
            .trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
