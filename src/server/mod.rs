//! HTTP plumbing shared by both demo services
//!
//! - Health state (readiness, forced failure, in-flight requests)
//! - JSON response envelope
//! - Cross-service probe client
//! - Prometheus metrics
//! - Graceful shutdown handling for SIGTERM/SIGINT/SIGQUIT

mod clock;
mod health;
pub mod metrics;
mod probe;
mod response;
pub mod shutdown;

pub use clock::{Clock, SystemClock};
pub use health::{
    evaluate, FailureToggle, HealthStatus, InflightCounter, InflightGuard, ReadinessState,
};
pub use metrics::{create_metrics, ServiceMetrics, SharedMetrics};
pub use probe::{PeerProbe, PeerTarget, ProbeOutcome};
pub use response::{json_response, Envelope, JsonReply};
pub use shutdown::{
    drain_inflight, flush_pending, shutdown_channel, ShutdownController, ShutdownOutcome,
    ShutdownSignal, SignalListener,
};

#[cfg(test)]
pub use clock::FixedClock;

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the listener for a service on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener, ServeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Listening (HTTP)");
    Ok(listener)
}

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
