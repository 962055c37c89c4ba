//! Demo api and worker services for exercising deployment infrastructure:
//! readiness/liveness probes, graceful shutdown and network isolation.

pub mod config;
pub mod server;
pub mod service;

pub use config::{ConfigError, ServiceConfig, Timings};
pub use service::{build_router, AppState, RunningService, ServiceKind, UnknownService};
