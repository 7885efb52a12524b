//! Shared application state.

use crate::backend::{Backend, BackendSelector, ServerPool};
use crate::config::{Algorithm, Config};
use crate::health::{HealthCheck, HealthMonitor, MonitorHandle};
use crate::metrics::MetricsCollector;
use crate::proxy::{Forward, HttpForwarder, RequestDispatcher};
use crate::util::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;

/// Everything the listener and the background tasks share, built once at
/// startup and handed to each component explicitly.
#[derive(Clone)]
pub struct AppState {
    /// The static backend pool.
    pool: Arc<ServerPool>,

    /// Dispatcher over the pool.
    dispatcher: RequestDispatcher,

    /// Metrics collector.
    metrics: MetricsCollector,

    /// Shutdown signal.
    shutdown: ShutdownSignal,
}

impl AppState {
    /// Build the pool and an HTTP dispatcher from a validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, url::ParseError> {
        let pool = config
            .backends
            .iter()
            .map(|raw| Backend::parse(raw))
            .collect::<Result<ServerPool, _>>()?;

        Ok(Self::new(
            pool,
            config.algorithm(),
            Arc::new(
                HttpForwarder::new(config.request_timeout).with_body_limit(config.max_body_size),
            ),
            MetricsCollector::new(),
        ))
    }

    /// Assemble state around an explicit forwarder.
    pub fn new(
        pool: ServerPool,
        algorithm: Algorithm,
        forwarder: Arc<dyn Forward>,
        metrics: MetricsCollector,
    ) -> Self {
        let pool = Arc::new(pool);
        for backend in pool.backends() {
            metrics.set_backend_health(backend.target().as_str(), backend.is_alive());
        }

        let selector = BackendSelector::new(Arc::clone(&pool), algorithm);
        let dispatcher = RequestDispatcher::new(selector, forwarder, metrics.clone());

        Self {
            pool,
            dispatcher,
            metrics,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Start health monitoring for every backend in the pool.
    pub fn spawn_health_monitor(
        &self,
        checker: Arc<dyn HealthCheck>,
        interval: Duration,
    ) -> MonitorHandle {
        HealthMonitor::new(
            Arc::clone(&self.pool),
            checker,
            interval,
            self.metrics.clone(),
        )
        .spawn(&self.shutdown)
    }

    /// Get the backend pool.
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Get the metrics collector.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Get the shutdown signal.
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Trigger shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.shutdown();
    }
}
