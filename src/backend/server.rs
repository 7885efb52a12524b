//! A single upstream server.
//!
//! Liveness and the active connection count live behind one lock per backend,
//! so two different backends never contend with each other.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// One upstream target the load balancer can route to.
#[derive(Debug)]
pub struct Backend {
    /// Upstream address (scheme + authority are used for forwarding).
    target: Url,
    /// Mutable liveness and load counters.
    state: Mutex<BackendState>,
}

#[derive(Debug)]
struct BackendState {
    alive: bool,
    /// Signed so an unpaired decrement shows up as a negative count
    /// instead of wrapping.
    active_connections: i64,
}

impl Backend {
    /// Create a backend for `target`. New backends start alive.
    pub fn new(target: Url) -> Self {
        Self {
            target,
            state: Mutex::new(BackendState {
                alive: true,
                active_connections: 0,
            }),
        }
    }

    /// Parse `raw` as a URL and create a backend for it.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(Self::new)
    }

    /// The upstream target.
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Overwrite the liveness flag. Any transition is allowed.
    pub fn set_alive(&self, alive: bool) {
        self.state.lock().alive = alive;
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    pub fn increment_connections(&self) {
        self.state.lock().active_connections += 1;
    }

    /// Never blocked, even if the count would go negative.
    pub fn decrement_connections(&self) {
        self.state.lock().active_connections -= 1;
    }

    pub fn active_connections(&self) -> i64 {
        self.state.lock().active_connections
    }

    /// Count one in-flight request against this backend until the returned
    /// guard is dropped.
    pub fn track_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.increment_connections();
        ConnectionGuard {
            backend: Arc::clone(self),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

/// Decrements the backend's connection count exactly once, on drop.
///
/// The count is released even if the request future is cancelled
/// mid-forward.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.decrement_connections();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_starts_alive_and_idle() {
        let backend = Backend::parse("http://localhost:5001").unwrap();
        assert!(backend.is_alive());
        assert_eq!(backend.active_connections(), 0);
        assert_eq!(backend.target().as_str(), "http://localhost:5001/");
    }

    #[test]
    fn test_set_alive_any_transition() {
        let backend = Backend::parse("http://localhost:5001").unwrap();

        backend.set_alive(false);
        assert!(!backend.is_alive());

        backend.set_alive(false);
        assert!(!backend.is_alive());

        backend.set_alive(true);
        assert!(backend.is_alive());
    }

    #[test]
    fn test_connection_counting() {
        let backend = Backend::parse("http://localhost:5001").unwrap();

        backend.increment_connections();
        backend.increment_connections();
        assert_eq!(backend.active_connections(), 2);

        backend.decrement_connections();
        assert_eq!(backend.active_connections(), 1);
    }

    #[test]
    fn test_decrement_is_not_clamped() {
        let backend = Backend::parse("http://localhost:5001").unwrap();
        backend.decrement_connections();
        assert_eq!(backend.active_connections(), -1);
    }

    #[test]
    fn test_guard_decrements_on_drop() {
        let backend = Arc::new(Backend::parse("http://localhost:5001").unwrap());

        let guard = backend.track_connection();
        assert_eq!(backend.active_connections(), 1);
        assert_eq!(guard.backend().target(), backend.target());

        drop(guard);
        assert_eq!(backend.active_connections(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Backend::parse("not a url").is_err());
    }
}
