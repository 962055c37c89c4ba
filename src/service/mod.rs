//! The two demo services and the handlers they share
//!
//! Both services expose the same health surface:
//! - `GET|POST /healthz` - 503 while warming up or when forced to fail
//! - `POST /healthz/fail` / `POST /healthz/recover` - toggle forced failure
//! - `GET /probe` - try to reach the peer service
//! - `GET /metrics` - Prometheus text format
//!
//! [`api`] and [`worker`] add their own routes on top.

pub mod api;
pub mod worker;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ServiceConfig, Timings};
use crate::server::{
    evaluate, shutdown_channel, Clock, Envelope, FailureToggle, HealthStatus, InflightCounter,
    JsonReply, PeerProbe, PeerTarget, ReadinessState, SharedMetrics, ShutdownController,
    ShutdownOutcome, ShutdownSignal, SystemClock,
};

/// Which of the two demo services this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Api,
    Worker,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown service: {0} (expected api or worker)")]
pub struct UnknownService(pub String);

impl FromStr for ServiceKind {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(ServiceKind::Api),
            "worker" => Ok(ServiceKind::Worker),
            other => Err(UnknownService(other.to_string())),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Api => "api",
            ServiceKind::Worker => "worker",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Api => 3456,
            ServiceKind::Worker => 9090,
        }
    }

    /// The service on the other side of `/probe`
    pub fn peer(&self) -> ServiceKind {
        match self {
            ServiceKind::Api => ServiceKind::Worker,
            ServiceKind::Worker => ServiceKind::Api,
        }
    }

    /// Environment variable holding the peer's base URL
    pub fn peer_env_var(&self) -> &'static str {
        match self.peer() {
            ServiceKind::Api => "API_URL",
            ServiceKind::Worker => "WORKER_URL",
        }
    }

    fn not_ready_message(&self) -> &'static str {
        match self {
            ServiceKind::Api => "still starting up",
            ServiceKind::Worker => "still warming up",
        }
    }

    fn fail_message(&self) -> &'static str {
        match self {
            ServiceKind::Api => {
                "healthcheck will now fail — liveness probe should restart this container"
            }
            ServiceKind::Worker => "healthcheck will now fail",
        }
    }

    fn recover_message(&self) -> &'static str {
        match self {
            ServiceKind::Api => "healthcheck will now pass again",
            ServiceKind::Worker => "healthcheck will now pass",
        }
    }
}

/// State shared by every handler of one service
#[derive(Clone)]
pub struct AppState {
    pub kind: ServiceKind,
    pub port: u16,
    pub timings: Timings,
    pub readiness: ReadinessState,
    pub failure: FailureToggle,
    pub inflight: InflightCounter,
    pub metrics: SharedMetrics,
    pub clock: Arc<dyn Clock>,
    pub probe: PeerProbe,
    pub peer: PeerTarget,
}

impl AppState {
    pub fn new(config: &ServiceConfig, metrics: SharedMetrics) -> Self {
        Self {
            kind: config.kind,
            port: config.port,
            timings: config.timings.clone(),
            readiness: ReadinessState::new(),
            failure: FailureToggle::new(),
            inflight: InflightCounter::new(),
            metrics,
            clock: Arc::new(SystemClock),
            probe: PeerProbe::new(config.timings.probe_timeout),
            peer: PeerTarget {
                name: config.kind.peer().name(),
                env_var: config.kind.peer_env_var(),
                url: config.peer_url.clone(),
            },
        }
    }

    /// Stamp a standard envelope for this service
    pub fn envelope(&self, status: &str, message: Option<String>) -> Envelope {
        Envelope {
            service: self.kind.name().to_string(),
            status: status.to_string(),
            port: self.port.to_string(),
            timestamp: self.clock.timestamp(),
            message,
        }
    }

    pub fn reply(&self, code: StatusCode, status: &str, message: Option<String>) -> JsonReply {
        JsonReply {
            code,
            envelope: self.envelope(status, message),
        }
    }

    fn track(&self, route: &str) {
        self.metrics.record_request(self.kind.name(), route);
    }
}

/// Readiness/health handler, mounted for both GET and POST
async fn healthz(State(state): State<AppState>) -> JsonReply {
    state.track("/healthz");

    let health = evaluate(&state.readiness, &state.failure);
    if health.is_healthy() {
        return state.reply(StatusCode::OK, health.as_str(), None);
    }

    let message = match health {
        HealthStatus::NotReady => state.kind.not_ready_message(),
        _ => "health manually toggled to fail",
    };
    state.reply(
        StatusCode::SERVICE_UNAVAILABLE,
        health.as_str(),
        Some(message.to_string()),
    )
}

async fn healthz_fail(State(state): State<AppState>) -> JsonReply {
    state.track("/healthz/fail");
    state.failure.fail();
    state.metrics.record_toggle(state.kind.name(), "fail");
    warn!(service = %state.kind, "Healthcheck toggled to FAIL");

    state.reply(
        StatusCode::OK,
        "ok",
        Some(state.kind.fail_message().to_string()),
    )
}

async fn healthz_recover(State(state): State<AppState>) -> JsonReply {
    state.track("/healthz/recover");
    state.failure.recover();
    state.metrics.record_toggle(state.kind.name(), "recover");
    info!(service = %state.kind, "Healthcheck toggled to PASS");

    state.reply(
        StatusCode::OK,
        "ok",
        Some(state.kind.recover_message().to_string()),
    )
}

/// Try to reach the peer service; always answers 200
async fn probe(State(state): State<AppState>) -> JsonReply {
    state.track("/probe");

    let outcome = state.probe.probe(&state.peer).await;
    state.reply(
        StatusCode::OK,
        outcome.status(),
        Some(outcome.message(&state.peer)),
    )
}

async fn metrics(State(state): State<AppState>) -> axum::response::Response {
    state
        .metrics
        .set_inflight(state.kind.name(), state.inflight.current());

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Routes both services share
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz).post(healthz))
        .route("/healthz/fail", post(healthz_fail))
        .route("/healthz/recover", post(healthz_recover))
        .route("/probe", get(probe))
        .route("/metrics", get(metrics))
}

/// Build the full router for the service described by `state`
pub fn build_router(state: AppState) -> Router {
    let routes = match state.kind {
        ServiceKind::Api => api::routes(),
        ServiceKind::Worker => worker::routes(),
    };

    health_routes().merge(routes).with_state(state)
}

/// A service whose HTTP server and background tasks are running
pub struct RunningService {
    state: AppState,
    controller: ShutdownController,
    server: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningService {
    /// Start serving on `listener` and spawn the background tasks
    ///
    /// The service reports not ready until the startup delay has elapsed.
    pub fn start(config: &ServiceConfig, metrics: SharedMetrics, listener: TcpListener) -> Self {
        let state = AppState::new(config, metrics);
        Self::start_with_state(state, listener)
    }

    pub fn start_with_state(state: AppState, listener: TcpListener) -> Self {
        let (controller, signal) = shutdown_channel();

        let app = build_router(state.clone());
        let service = state.kind;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(service = %service, error = %e, "HTTP server failed");
            }
        });

        let mut tasks = vec![spawn_warmup(&state, signal.clone())];
        if state.kind == ServiceKind::Worker {
            tasks.push(worker::spawn_batch_loop(&state, signal));
        }

        Self {
            state,
            controller,
            server,
            tasks,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the shutdown sequence after `signal` was received
    ///
    /// The HTTP server keeps serving while the api drains, so in-flight
    /// requests can complete. Readiness is left untouched: `/healthz` keeps
    /// answering as before until the process exits.
    pub async fn shutdown(self, signal: &str) -> ShutdownOutcome {
        let service = self.state.kind;
        info!(service = %service, signal, "Received signal, starting graceful shutdown");

        self.controller.shutdown();

        let outcome = match service {
            ServiceKind::Api => api::drain(&self.state).await,
            ServiceKind::Worker => worker::flush(&self.state).await,
        };

        match outcome {
            ShutdownOutcome::Clean => {
                info!(service = %service, signal, "Clean shutdown");
            }
            ShutdownOutcome::DeadlineExceeded { inflight } => {
                warn!(
                    service = %service,
                    signal,
                    inflight,
                    "Shutdown deadline reached with in-flight requests"
                );
            }
        }

        for task in self.tasks {
            task.abort();
        }
        self.server.abort();
        outcome
    }
}

/// Flip readiness once the startup delay has passed
fn spawn_warmup(state: &AppState, mut signal: ShutdownSignal) -> JoinHandle<()> {
    let readiness = state.readiness.clone();
    let delay = state.timings.startup_delay;
    let service = state.kind;

    match service {
        ServiceKind::Api => info!(service = %service, delay = ?delay, "Starting up"),
        ServiceKind::Worker => info!(service = %service, delay = ?delay, "Warming up"),
    }

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                readiness.set_ready();
                info!(service = %service, "Ready to serve traffic");
            }
            _ = signal.wait() => {}
        }
    })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
