//! Request dispatch with bounded retries and passive failure detection.
//!
//! Each attempt selects a backend, tracks the in-flight request on it, and
//! forwards. A transport failure or a non-2xx answer marks that backend dead
//! immediately and moves on to the next attempt. Only a 2xx answer is ever
//! returned to the client.

use crate::backend::BackendSelector;
use crate::metrics::MetricsCollector;
use crate::proxy::{Forward, ProxyRequest, ProxyResponse};
use hyper::StatusCode;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Attempts made for one inbound request before giving up.
pub const MAX_ATTEMPTS: usize = 3;

/// Dispatch failure. The client sees a 502 either way.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no healthy backend could serve the request")]
    NoHealthyBackend,
}

impl DispatchError {
    /// Status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoHealthyBackend => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Routes requests to backends.
#[derive(Clone)]
pub struct RequestDispatcher {
    selector: BackendSelector,
    forwarder: Arc<dyn Forward>,
    metrics: MetricsCollector,
}

impl RequestDispatcher {
    /// Create a dispatcher.
    pub fn new(
        selector: BackendSelector,
        forwarder: Arc<dyn Forward>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            selector,
            forwarder,
            metrics,
        }
    }

    /// Number of backends currently marked alive.
    pub fn healthy_backends(&self) -> usize {
        self.selector.pool().healthy_count()
    }

    /// Forward `request` to a healthy backend, retrying on failure.
    ///
    /// Fails immediately when no backend is alive at the start of an attempt,
    /// and after [`MAX_ATTEMPTS`] failed attempts otherwise.
    #[instrument(
        skip_all,
        fields(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path_and_query,
        )
    )]
    pub async fn handle_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, DispatchError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let Some(backend) = self.selector.select() else {
                warn!(attempt, "no healthy backend available");
                return Err(DispatchError::NoHealthyBackend);
            };

            let guard = backend.track_connection();
            let result = self.forwarder.forward(request, &backend).await;
            drop(guard);

            let name = backend.target().as_str();
            match result {
                Ok(response) if response.status.is_success() => {
                    self.metrics.record_attempt(name, true);
                    debug!(
                        attempt,
                        backend = %backend,
                        status = response.status.as_u16(),
                        "request forwarded"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    warn!(
                        attempt,
                        backend = %backend,
                        status = response.status.as_u16(),
                        "backend answered with a failure status"
                    );
                }
                Err(e) => {
                    warn!(attempt, backend = %backend, error = %e, "forward attempt failed");
                }
            }

            self.metrics.record_attempt(name, false);
            backend.set_alive(false);
            self.metrics.set_backend_health(name, false);
        }

        error!(attempts = MAX_ATTEMPTS, "all attempts failed");
        Err(DispatchError::NoHealthyBackend)
    }
}
