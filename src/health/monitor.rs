//! Periodic health monitoring, one task per backend.
//!
//! Each task ticks on a fixed interval, checks its backend, and overwrites
//! the backend's liveness flag with the result. Tasks never coordinate with
//! each other or with the dispatcher: a check result and a concurrent passive
//! demotion of the same backend are last-writer-wins.

use crate::backend::{Backend, ServerPool};
use crate::health::HealthCheck;
use crate::metrics::MetricsCollector;
use crate::util::{ShutdownListener, ShutdownSignal};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest check period; smaller intervals, zero included, are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns and owns the per-backend health tasks.
pub struct HealthMonitor {
    /// Backends to watch.
    pool: Arc<ServerPool>,
    /// Checker used on every tick.
    checker: Arc<dyn HealthCheck>,
    /// Time between checks.
    interval: Duration,
    /// Metrics collector.
    metrics: MetricsCollector,
}

impl HealthMonitor {
    /// Create a new health monitor.
    ///
    /// `interval` is raised to [`MIN_INTERVAL`] if it is shorter.
    pub fn new(
        pool: Arc<ServerPool>,
        checker: Arc<dyn HealthCheck>,
        interval: Duration,
        metrics: MetricsCollector,
    ) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                interval_ms = interval.as_millis() as u64,
                min_ms = MIN_INTERVAL.as_millis() as u64,
                "health interval too short, raising to minimum"
            );
        }

        Self {
            pool,
            checker,
            interval: interval.max(MIN_INTERVAL),
            metrics,
        }
    }

    /// Start one task per backend. Every task stops once `shutdown` fires.
    ///
    /// The first check runs one interval after this call.
    pub fn spawn(self, shutdown: &ShutdownSignal) -> MonitorHandle {
        info!(
            backends = self.pool.count(),
            interval_ms = self.interval.as_millis() as u64,
            "health monitor starting"
        );

        let handles = self
            .pool
            .backends()
            .iter()
            .map(|backend| {
                for_backend(
                    Arc::clone(backend),
                    Arc::clone(&self.checker),
                    self.interval,
                    self.metrics.clone(),
                    shutdown.subscribe(),
                )
            })
            .collect();

        MonitorHandle { handles }
    }
}

/// Join handles for the running health tasks.
pub struct MonitorHandle {
    handles: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Number of tasks started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// True once every task has stopped.
    pub fn is_stopped(&self) -> bool {
        self.handles.iter().all(|h| h.is_finished())
    }

    /// Wait for every task to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "health task ended abnormally");
            }
        }
    }
}

fn for_backend(
    backend: Arc<Backend>,
    checker: Arc<dyn HealthCheck>,
    period: Duration,
    metrics: MetricsCollector,
    mut shutdown: ShutdownListener,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                _ = ticker.tick() => {
                    // A check still running at shutdown is abandoned unwritten.
                    let alive = tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        alive = checker.check(backend.target()) => alive,
                    };
                    record(&backend, alive, &metrics);
                }
            }
        }

        debug!(backend = %backend, "health task stopped");
    })
}

fn record(backend: &Backend, alive: bool, metrics: &MetricsCollector) {
    let was_alive = backend.is_alive();
    backend.set_alive(alive);

    let name = backend.target().as_str();
    metrics.record_health_check(name, alive);
    metrics.set_backend_health(name, alive);

    match (was_alive, alive) {
        (false, true) => info!(backend = %backend, "backend back online"),
        (true, false) => warn!(backend = %backend, "backend marked down by health check"),
        _ => debug!(backend = %backend, alive, "health check recorded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout};
    use url::Url;

    /// Healthy iff the target's port is in the list.
    struct PortCheck {
        healthy_ports: Vec<u16>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthCheck for PortCheck {
        async fn check(&self, target: &Url) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            target
                .port()
                .is_some_and(|p| self.healthy_ports.contains(&p))
        }
    }

    /// Answers from a switchable flag.
    struct Toggle(AtomicBool);

    #[async_trait]
    impl HealthCheck for Toggle {
        async fn check(&self, _target: &Url) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Never returns.
    struct Hang;

    #[async_trait]
    impl HealthCheck for Hang {
        async fn check(&self, _target: &Url) -> bool {
            std::future::pending::<()>().await;
            true
        }
    }

    fn pool_of(urls: &[&str]) -> Arc<ServerPool> {
        Arc::new(urls.iter().map(|u| Backend::parse(u).unwrap()).collect())
    }

    #[tokio::test]
    async fn test_resurrects_and_demotes() {
        let pool = pool_of(&["http://localhost:5001", "http://localhost:5003"]);
        pool.backends()[0].set_alive(false);
        pool.backends()[1].set_alive(true);

        let checker = Arc::new(PortCheck {
            healthy_ports: vec![5001],
            calls: AtomicUsize::new(0),
        });
        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::clone(&pool),
            checker.clone(),
            Duration::from_millis(50),
            MetricsCollector::new(),
        )
        .spawn(&shutdown);
        assert_eq!(handle.len(), 2);

        sleep(Duration::from_millis(200)).await;

        assert!(pool.backends()[0].is_alive(), "5001 should be marked healthy");
        assert!(!pool.backends()[1].is_alive(), "5003 should be marked unhealthy");
        assert!(checker.calls.load(Ordering::SeqCst) >= 2);

        shutdown.shutdown();
        timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_check_before_first_interval() {
        let pool = pool_of(&["http://localhost:5001"]);
        let checker = Arc::new(PortCheck {
            healthy_ports: vec![],
            calls: AtomicUsize::new(0),
        });
        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::clone(&pool),
            checker.clone(),
            Duration::from_secs(60),
            MetricsCollector::new(),
        )
        .spawn(&shutdown);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
        assert!(pool.backends()[0].is_alive());

        shutdown.shutdown();
        timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_task_writes_nothing() {
        let pool = pool_of(&["http://localhost:5001"]);
        let checker = Arc::new(Toggle(AtomicBool::new(true)));
        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::clone(&pool),
            checker.clone(),
            Duration::from_millis(20),
            MetricsCollector::new(),
        )
        .spawn(&shutdown);

        shutdown.shutdown();
        timeout(Duration::from_secs(1), handle.join()).await.unwrap();

        pool.backends()[0].set_alive(false);
        sleep(Duration::from_millis(100)).await;
        assert!(!pool.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_inflight_check() {
        let pool = pool_of(&["http://localhost:5001"]);
        pool.backends()[0].set_alive(false);

        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::clone(&pool),
            Arc::new(Hang),
            Duration::from_millis(10),
            MetricsCollector::new(),
        )
        .spawn(&shutdown);

        sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
        timeout(Duration::from_secs(1), handle.join()).await.unwrap();
        assert!(!pool.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_empty_pool_spawns_nothing() {
        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::new(ServerPool::new()),
            Arc::new(Toggle(AtomicBool::new(true))),
            Duration::from_millis(10),
            MetricsCollector::new(),
        )
        .spawn(&shutdown);
        assert!(handle.is_empty());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised() {
        let pool = pool_of(&["http://localhost:5001"]);
        pool.backends()[0].set_alive(false);
        let checker = Arc::new(PortCheck {
            healthy_ports: vec![5001],
            calls: AtomicUsize::new(0),
        });

        let shutdown = ShutdownSignal::new();
        let handle = HealthMonitor::new(
            Arc::clone(&pool),
            checker.clone(),
            Duration::ZERO,
            MetricsCollector::new(),
        )
        .spawn(&shutdown);

        sleep(Duration::from_millis(100)).await;
        assert!(checker.calls.load(Ordering::SeqCst) >= 1);
        assert!(pool.backends()[0].is_alive());
        assert!(!handle.is_stopped());

        shutdown.shutdown();
        timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    }
}
