//! Prometheus metrics for the demo services
//!
//! Each process owns its own [`prometheus::Registry`] so that tests can run
//! several services side by side without name collisions.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub type SharedMetrics = Arc<ServiceMetrics>;

pub struct ServiceMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    inflight_requests: IntGaugeVec,
    health_toggles_total: IntCounterVec,
    worker_batches_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("probe_demo_requests_total", "Requests handled per route"),
            &["service", "route"],
        )?;
        let inflight_requests = IntGaugeVec::new(
            Opts::new(
                "probe_demo_inflight_requests",
                "Requests currently being served",
            ),
            &["service"],
        )?;
        let health_toggles_total = IntCounterVec::new(
            Opts::new(
                "probe_demo_health_toggles_total",
                "Calls to /healthz/fail and /healthz/recover",
            ),
            &["service", "state"],
        )?;
        let worker_batches_total = IntCounter::new(
            "probe_demo_worker_batches_total",
            "Background batches processed by the worker",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(inflight_requests.clone()))?;
        registry.register(Box::new(health_toggles_total.clone()))?;
        registry.register(Box::new(worker_batches_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            inflight_requests,
            health_toggles_total,
            worker_batches_total,
        })
    }

    pub fn record_request(&self, service: &str, route: &str) {
        self.requests_total
            .with_label_values(&[service, route])
            .inc();
    }

    pub fn set_inflight(&self, service: &str, count: i64) {
        self.inflight_requests
            .with_label_values(&[service])
            .set(count);
    }

    /// `state` is `fail` or `recover`
    pub fn record_toggle(&self, service: &str, state: &str) {
        self.health_toggles_total
            .with_label_values(&[service, state])
            .inc();
    }

    pub fn record_batch(&self) {
        self.worker_batches_total.inc();
    }

    /// Render all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create a fresh metrics registry for one service process
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ServiceMetrics::new()?))
}
