//! Environment configuration for the demo services
//!
//! Both services read their settings once at startup:
//! - `PORT` - listen port (api: 3456, worker: 9090)
//! - `WORKER_URL` / `API_URL` - peer address used by `/probe`
//!
//! Timings are not read from the environment. They live in [`Timings`] so
//! tests can shrink them.

use std::time::Duration;
use thiserror::Error;

use crate::service::ServiceKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PORT {value:?}: {reason}")]
    InvalidPort { value: String, reason: String },
}

/// Fixed delays that drive the simulated behavior of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Time between process start and the readiness flag flipping
    pub startup_delay: Duration,
    /// How long `GET /slow` sleeps (api)
    pub slow_request: Duration,
    /// Client timeout for `GET /probe`
    pub probe_timeout: Duration,
    /// Upper bound on waiting for in-flight requests at shutdown (api)
    pub drain_deadline: Duration,
    pub drain_poll: Duration,
    /// Simulated flush at shutdown (worker)
    pub flush: Duration,
    /// Period of the background batch ticker (worker)
    pub batch_interval: Duration,
}

impl Timings {
    pub fn for_service(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Api => Self {
                startup_delay: Duration::from_secs(3),
                slow_request: Duration::from_secs(5),
                probe_timeout: Duration::from_secs(3),
                drain_deadline: Duration::from_secs(10),
                drain_poll: Duration::from_millis(100),
                flush: Duration::ZERO,
                batch_interval: Duration::ZERO,
            },
            ServiceKind::Worker => Self {
                startup_delay: Duration::from_secs(2),
                slow_request: Duration::ZERO,
                probe_timeout: Duration::from_secs(3),
                drain_deadline: Duration::ZERO,
                drain_poll: Duration::from_millis(100),
                flush: Duration::from_secs(2),
                batch_interval: Duration::from_secs(5),
            },
        }
    }
}

/// Resolved configuration for one service process
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub port: u16,
    /// Base URL of the other service, if configured
    pub peer_url: Option<String>,
    pub timings: Timings,
}

impl ServiceConfig {
    /// Build a config with defaults only (no environment lookups)
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            port: kind.default_port(),
            peer_url: None,
            timings: Timings::for_service(kind),
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env(kind: ServiceKind) -> Result<Self, ConfigError> {
        Self::from_lookup(kind, |key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary lookup function
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(kind: ServiceKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort {
                    reason: e.to_string(),
                    value,
                })?,
            None => kind.default_port(),
        };

        Ok(Self {
            kind,
            port,
            peer_url: get(kind.peer_env_var()),
            timings: Timings::for_service(kind),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
