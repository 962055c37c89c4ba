//! Cross-service reachability probe
//!
//! `GET /probe` calls `<peer>/healthz` to check whether network isolation
//! between the two services is in place. Reaching the peer at all, with any
//! status code, means isolation is broken.

use std::time::Duration;
use tracing::{info, warn};

/// The peer service a probe is aimed at
#[derive(Debug, Clone)]
pub struct PeerTarget {
    /// Peer service name, used in messages (`worker`, `api`)
    pub name: &'static str,
    /// Environment variable the URL comes from
    pub env_var: &'static str,
    pub url: Option<String>,
}

/// Result of probing the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No peer URL configured
    Skipped,
    /// Transport-level failure: refused, unresolvable or timed out
    Isolated { error: String },
    /// The peer answered with an HTTP status
    Reachable { status: u16 },
}

impl ProbeOutcome {
    /// Value of the envelope's `status` field
    pub fn status(&self) -> &'static str {
        match self {
            ProbeOutcome::Skipped => "skipped",
            ProbeOutcome::Isolated { .. } => "isolated",
            ProbeOutcome::Reachable { .. } => "NOT_ISOLATED",
        }
    }

    pub fn message(&self, target: &PeerTarget) -> String {
        let url = target.url.as_deref().unwrap_or_default();
        match self {
            ProbeOutcome::Skipped => format!(
                "{} not set — set it to the {}'s internal address to test network isolation",
                target.env_var, target.name
            ),
            ProbeOutcome::Isolated { error } => format!(
                "cannot reach {} at {}: {} — network isolation is working",
                target.name, url, error
            ),
            ProbeOutcome::Reachable { status } => format!(
                "reached {} at {} — got HTTP {} — network isolation is BROKEN",
                target.name, url, status
            ),
        }
    }
}

/// HTTP client used for probing, with a fixed per-request timeout
#[derive(Debug, Clone)]
pub struct PeerProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl PeerProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn probe(&self, target: &PeerTarget) -> ProbeOutcome {
        let Some(base) = target.url.as_deref() else {
            return ProbeOutcome::Skipped;
        };
        let url = format!("{}/healthz", base.trim_end_matches('/'));

        info!(peer = target.name, url = %url, "Probing peer service");
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(
                    peer = target.name,
                    status,
                    "Probe SUCCEEDED (network isolation BROKEN)"
                );
                ProbeOutcome::Reachable { status }
            }
            Err(e) => {
                let error = error_chain(&e);
                info!(
                    peer = target.name,
                    error = %error,
                    "Probe FAILED (network isolation working)"
                );
                ProbeOutcome::Isolated { error }
            }
        }
    }
}

/// Render an error with all of its causes, `outer: inner: root`
///
/// reqwest's own message only names the URL; the refusal or timeout is in
/// the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
#[path = "probe_test.rs"]
mod tests;
