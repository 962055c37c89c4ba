//! Health state shared between handlers and background tasks
//!
//! - [`ReadinessState`] - flips to ready after the startup delay
//! - [`FailureToggle`] - forced failure set by `/healthz/fail`
//! - [`InflightCounter`] - requests currently being served (api)
//!
//! [`evaluate`] turns the two flags into the `/healthz` answer.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Shared state for readiness tracking
///
/// Starts not ready and is set once by the warm-up task.
#[derive(Debug, Clone)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Manually forced health failure
#[derive(Debug, Clone, Default)]
pub struct FailureToggle {
    failing: Arc<AtomicBool>,
}

impl FailureToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

/// Count of requests currently being handled
#[derive(Debug, Clone, Default)]
pub struct InflightCounter {
    count: Arc<AtomicI64>,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request; the count drops again when the guard is dropped
    pub fn enter(&self) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn current(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Decrements the owning [`InflightCounter`] on drop
#[derive(Debug)]
#[must_use = "the request is only counted while the guard is alive"]
pub struct InflightGuard {
    count: Arc<AtomicI64>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outcome of a health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Still inside the startup delay
    NotReady,
    /// Failure forced through `/healthz/fail`
    Unhealthy,
    Healthy,
}

impl HealthStatus {
    /// Value of the envelope's `status` field
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::NotReady => "not_ready",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Healthy => "healthy",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Readiness wins over forced failure: a service that is still starting
/// reports `not_ready` even when it has been toggled to fail.
pub fn evaluate(readiness: &ReadinessState, failure: &FailureToggle) -> HealthStatus {
    if !readiness.is_ready() {
        HealthStatus::NotReady
    } else if failure.is_failing() {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}
