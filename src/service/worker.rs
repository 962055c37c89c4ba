//! worker service routes and background loop
//!
//! The worker has no routes beyond the shared health surface and `GET /`.
//! Its "work" is a ticker that logs an increasing batch number.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::info;

use super::AppState;
use crate::server::{flush_pending, JsonReply, SharedMetrics, ShutdownOutcome, ShutdownSignal};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .fallback(fallback)
}

async fn fallback(method: Method, state: State<AppState>) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    root(state).await.into_response()
}

pub(super) async fn flush(state: &AppState) -> ShutdownOutcome {
    flush_pending(state.timings.flush).await
}

async fn root(State(state): State<AppState>) -> JsonReply {
    state.track("/");
    state.reply(
        StatusCode::OK,
        "ok",
        Some("background worker running".to_string()),
    )
}

pub(super) fn spawn_batch_loop(state: &AppState, signal: ShutdownSignal) -> JoinHandle<()> {
    let period = state.timings.batch_interval;
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let processed = run_batch_loop(period, metrics, signal).await;
        info!(batches = processed, "Batch loop stopped");
    })
}

/// Tick every `period`, starting one full period from now, until shutdown
///
/// Returns the number of batches processed.
pub async fn run_batch_loop(
    period: Duration,
    metrics: SharedMetrics,
    mut signal: ShutdownSignal,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + period, period);
    let mut batch = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                batch += 1;
                metrics.record_batch();
                info!(batch, "Processing batch");
            }
            _ = signal.wait() => return batch,
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
