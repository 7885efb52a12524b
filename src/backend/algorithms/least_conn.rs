//! Least-connections load balancing algorithm.

use super::LoadBalancer;
use crate::backend::{Backend, ServerPool};
use std::sync::Arc;

/// Least-connections load balancer.
///
/// Scans the full pool in insertion order and picks the live backend with
/// the fewest active connections. Ties go to the first one seen.
///
/// The scan is a snapshot: counts may change between the scan and the
/// caller's own increment.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    /// Create a new least-connections load balancer.
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, pool: &ServerPool) -> Option<Arc<Backend>> {
        let mut min_conns = i64::MAX;
        let mut selected = None;

        for backend in pool.backends() {
            if !backend.is_alive() {
                continue;
            }
            let conns = backend.active_connections();
            // Strict less-than: an equal count later in the list never wins.
            if conns < min_conns {
                min_conns = conns;
                selected = Some(backend);
            }
        }

        selected.cloned()
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
