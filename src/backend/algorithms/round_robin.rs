//! Round-robin load balancing algorithm.

use super::LoadBalancer;
use crate::backend::{Backend, ServerPool};
use std::sync::Arc;

/// Round-robin load balancer.
///
/// Indexes the pool's healthy snapshot with the pool's shared cursor. The
/// snapshot is taken fresh on every call, so if liveness changes between two
/// calls the cycle may skip or repeat an entry.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    /// Create a new round-robin load balancer.
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, pool: &ServerPool) -> Option<Arc<Backend>> {
        let healthy = pool.healthy_snapshot();
        if healthy.is_empty() {
            return None;
        }

        let idx = pool.next_rotation_index() % healthy.len() as u64;
        healthy.into_iter().nth(idx as usize)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
