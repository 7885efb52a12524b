//! The ordered backend pool shared by every request and health task.

use crate::backend::Backend;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered collection of backends plus the shared round-robin cursor.
///
/// Backends are added while the pool is still exclusively owned during
/// startup; once wrapped in an `Arc` the list is fixed and only the
/// per-backend state and the cursor change.
#[derive(Debug, Default)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    cursor: AtomicU64,
}

impl ServerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend. Insertion order is iteration order.
    pub fn add(&mut self, backend: Backend) {
        self.backends.push(Arc::new(backend));
    }

    /// Every backend, alive or not, in insertion order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// The backends currently alive, in insertion order.
    ///
    /// Recomputed on every call; an empty vector means nothing is alive.
    pub fn healthy_snapshot(&self) -> Vec<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_alive())
            .cloned()
            .collect()
    }

    /// Number of backends currently alive.
    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    /// Total number of backends regardless of liveness.
    pub fn count(&self) -> usize {
        self.backends.len()
    }

    /// Read the rotation cursor and advance it by one.
    ///
    /// No two callers ever observe the same value.
    pub fn next_rotation_index(&self) -> u64 {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }
}

impl FromIterator<Backend> for ServerPool {
    fn from_iter<I: IntoIterator<Item = Backend>>(iter: I) -> Self {
        let mut pool = ServerPool::new();
        for backend in iter {
            pool.add(backend);
        }
        pool
    }
}
