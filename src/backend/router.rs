//! Backend selector: the configured policy applied to the shared pool.

use crate::backend::algorithms::{self, LoadBalancer};
use crate::backend::{Backend, ServerPool};
use crate::config::Algorithm;
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks a live backend from the pool using the configured algorithm.
#[derive(Clone)]
pub struct BackendSelector {
    /// The shared pool.
    pool: Arc<ServerPool>,
    /// The load balancer algorithm.
    algorithm: Arc<dyn LoadBalancer>,
}

impl BackendSelector {
    /// Create a selector for `pool` using `algorithm`.
    pub fn new(pool: Arc<ServerPool>, algorithm: Algorithm) -> Self {
        Self::with_policy(pool, algorithms::for_algorithm(algorithm))
    }

    /// Create a selector with an explicit policy.
    pub fn with_policy(pool: Arc<ServerPool>, algorithm: Arc<dyn LoadBalancer>) -> Self {
        Self { pool, algorithm }
    }

    /// Select a live backend.
    ///
    /// # Returns
    ///
    /// The chosen backend, or `None` if no backend is currently alive.
    pub fn select(&self) -> Option<Arc<Backend>> {
        let selected = self.algorithm.select(&self.pool);

        match &selected {
            Some(backend) => {
                debug!(
                    algorithm = self.algorithm.name(),
                    backend = %backend,
                    "selected backend"
                );
            }
            None => {
                warn!(
                    algorithm = self.algorithm.name(),
                    backends = self.pool.count(),
                    "no healthy backends available"
                );
            }
        }

        selected
    }

    /// The pool this selector draws from.
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Name of the active policy.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }
}
