//! Metrics collector using prometheus-client.
//!
//! Provides metrics for inbound requests, per-backend forward attempts,
//! and backend health.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// Labels for inbound request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    pub status: String,
}

/// Labels for forward attempt metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AttemptLabels {
    pub backend: String,
    pub outcome: AttemptOutcome,
}

/// Outcome of one forward attempt.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Labels for backend health metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabels {
    pub backend: String,
}

/// Labels for health check metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HealthCheckLabels {
    pub backend: String,
    pub result: HealthCheckResult,
}

/// Result of a health check.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HealthCheckResult {
    Success,
    Failure,
}

/// Collects and stores all metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsCollectorInner>,
}

struct MetricsCollectorInner {
    /// Total inbound requests counter.
    requests_total: Family<RequestLabels, Counter>,
    /// Inbound request duration histogram (in seconds).
    request_duration_seconds: Histogram,
    /// Forward attempts per backend.
    attempts_total: Family<AttemptLabels, Counter>,
    /// Backend health gauge (1 = alive, 0 = dead).
    backend_health: Family<BackendLabels, Gauge>,
    /// Health check results counter.
    health_checks_total: Family<HealthCheckLabels, Counter>,
    /// The prometheus registry.
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_total = Family::<RequestLabels, Counter>::default();
        // Buckets: 1ms, 2.5ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
        let request_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.5, 13));
        let attempts_total = Family::<AttemptLabels, Counter>::default();
        let backend_health = Family::<BackendLabels, Gauge>::default();
        let health_checks_total = Family::<HealthCheckLabels, Counter>::default();

        registry.register(
            "relaylb_requests",
            "Total number of inbound requests handled",
            requests_total.clone(),
        );
        registry.register(
            "relaylb_request_duration_seconds",
            "Inbound request duration in seconds, retries included",
            request_duration_seconds.clone(),
        );
        registry.register(
            "relaylb_attempts",
            "Forward attempts per backend",
            attempts_total.clone(),
        );
        registry.register(
            "relaylb_backend_health",
            "Backend liveness (1=alive, 0=dead)",
            backend_health.clone(),
        );
        registry.register(
            "relaylb_health_checks",
            "Total number of health checks performed",
            health_checks_total.clone(),
        );

        Self {
            inner: Arc::new(MetricsCollectorInner {
                requests_total,
                request_duration_seconds,
                attempts_total,
                backend_health,
                health_checks_total,
                registry,
            }),
        }
    }

    /// Get the prometheus registry for encoding.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Record a completed inbound request.
    pub fn record_request(&self, method: &str, status: u16, duration: Duration) {
        let labels = RequestLabels {
            method: method.to_string(),
            status: status.to_string(),
        };
        self.inner.requests_total.get_or_create(&labels).inc();
        self.inner
            .request_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record one forward attempt against a backend.
    pub fn record_attempt(&self, backend: &str, success: bool) {
        let labels = AttemptLabels {
            backend: backend.to_string(),
            outcome: if success {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failure
            },
        };
        self.inner.attempts_total.get_or_create(&labels).inc();
    }

    /// Update backend health status.
    pub fn set_backend_health(&self, backend: &str, alive: bool) {
        let labels = BackendLabels {
            backend: backend.to_string(),
        };
        self.inner
            .backend_health
            .get_or_create(&labels)
            .set(if alive { 1 } else { 0 });
    }

    /// Record a health check result.
    pub fn record_health_check(&self, backend: &str, success: bool) {
        let labels = HealthCheckLabels {
            backend: backend.to_string(),
            result: if success {
                HealthCheckResult::Success
            } else {
                HealthCheckResult::Failure
            },
        };
        self.inner.health_checks_total.get_or_create(&labels).inc();
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, self.registry())?;
        Ok(buffer)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
