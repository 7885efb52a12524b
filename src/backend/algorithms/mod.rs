//! Load balancing algorithms.

mod least_conn;
mod round_robin;

pub use least_conn::LeastConnections;
pub use round_robin::RoundRobin;

use crate::backend::{Backend, ServerPool};
use crate::config::Algorithm;
use std::sync::Arc;

/// Trait for load balancing algorithms.
///
/// Implementations only read backend state; the pool's rotation cursor is
/// the one piece of shared state a policy may advance.
pub trait LoadBalancer: Send + Sync {
    /// Pick one live backend from `pool`, or `None` if nothing is alive.
    fn select(&self, pool: &ServerPool) -> Option<Arc<Backend>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Build the policy for a configured algorithm.
pub fn for_algorithm(algorithm: Algorithm) -> Arc<dyn LoadBalancer> {
    match algorithm {
        Algorithm::RoundRobin => Arc::new(RoundRobin::new()),
        Algorithm::LeastConnections => Arc::new(LeastConnections::new()),
    }
}
