//! api service routes
//!
//! - `GET /` - info message with a request number and the in-flight count
//! - `GET /slow` - sleeps before answering, for exercising shutdown drains
//! - `GET /protected` - echoes the `X-Unkey-Principal` header
//! - `GET /env` - dumps the process environment
//!
//! `/`, `/slow` and `/protected` count as in-flight while they run. Shutdown
//! waits for that count to reach zero.

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::AppState;
use crate::server::{drain_inflight, json_response, JsonReply, ShutdownOutcome};

/// Header set by the sentinel KeyAuth middleware in front of the api
pub const PRINCIPAL_HEADER: &str = "x-unkey-principal";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/slow", get(slow))
        .route("/protected", get(protected))
        .route("/env", get(env))
        .fallback(fallback)
}

/// Any other GET (or HEAD) path answers like `/`
async fn fallback(method: Method, state: State<AppState>) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    root(state).await.into_response()
}

pub(super) async fn drain(state: &AppState) -> ShutdownOutcome {
    drain_inflight(
        &state.inflight,
        state.timings.drain_deadline,
        state.timings.drain_poll,
    )
    .await
}

async fn root(State(state): State<AppState>) -> JsonReply {
    let _guard = state.inflight.enter();
    state.track("/");

    let request_number: u32 = rand::rng().random_range(0..10_000);
    state.reply(
        StatusCode::OK,
        "ok",
        Some(format!(
            "request #{} | in-flight: {}",
            request_number,
            state.inflight.current()
        )),
    )
}

async fn slow(State(state): State<AppState>) -> JsonReply {
    let _guard = state.inflight.enter();
    state.track("/slow");

    let duration = state.timings.slow_request;
    info!(duration = ?duration, "Slow request started");
    tokio::time::sleep(duration).await;

    state.reply(
        StatusCode::OK,
        "ok",
        Some(format!("slow request completed after {:?}", duration)),
    )
}

#[derive(Debug, Serialize)]
struct AuthenticatedReply<'a> {
    service: &'a str,
    status: &'a str,
    port: String,
    /// `null` when the header is the JSON literal `null`
    principal: Option<Map<String, Value>>,
}

async fn protected(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let _guard = state.inflight.enter();
    state.track("/protected");

    let principal = headers
        .get(PRINCIPAL_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    if principal.is_empty() {
        warn!("GET /protected without X-Unkey-Principal header");
        return state
            .reply(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                Some(
                    "missing X-Unkey-Principal header — sentinel middleware not configured?"
                        .to_string(),
                ),
            )
            .into_response();
    }

    info!(principal = %principal, "GET /protected");

    match serde_json::from_str::<Option<Map<String, Value>>>(&principal) {
        Ok(parsed) => json_response(
            StatusCode::OK,
            &AuthenticatedReply {
                service: state.kind.name(),
                status: "authenticated",
                port: state.port.to_string(),
                principal: parsed,
            },
            true,
        ),
        Err(e) => {
            warn!(error = %e, "Principal header is not a JSON object");
            state
                .reply(
                    StatusCode::OK,
                    "ok",
                    Some(format!("principal (raw): {}", principal)),
                )
                .into_response()
        }
    }
}

/// All environment variables, keys sorted
fn environment_snapshot() -> BTreeMap<String, String> {
    std::env::vars_os()
        .map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

async fn env(State(state): State<AppState>) -> Response {
    state.track("/env");
    json_response(StatusCode::OK, &environment_snapshot(), true)
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
