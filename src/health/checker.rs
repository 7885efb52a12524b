//! Active health check.
//!
//! Issues a `HEAD` request against a backend's target. Any transport error,
//! timeout, or non-2xx status counts as unhealthy; nothing is propagated.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::header::{HeaderValue, USER_AGENT};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Capability that decides whether a backend target is healthy.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Check `target`. Failures of any kind are reported as `false`.
    async fn check(&self, target: &Url) -> bool;
}

/// HTTP `HEAD` check with a fixed timeout.
#[derive(Clone)]
pub struct HttpHealthCheck {
    client: Client<HttpConnector, Empty<Bytes>>,
    timeout: Duration,
}

impl HttpHealthCheck {
    /// Create a checker that gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    /// Perform a single check.
    async fn send_head(&self, target: &Url) -> Result<(), String> {
        let request = Request::builder()
            .method(Method::HEAD)
            .uri(target.as_str())
            .header(USER_AGENT, HeaderValue::from_static("relaylb-health-check"))
            .body(Empty::new())
            .map_err(|e| format!("invalid health request: {}", e))?;

        let response = match timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(format!("connection failed: {}", e)),
            Err(_) => return Err("health check timeout".to_string()),
        };

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("unexpected status: {}", status.as_u16()))
        }
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, target: &Url) -> bool {
        match self.send_head(target).await {
            Ok(()) => {
                debug!(backend = %target, "health check passed");
                true
            }
            Err(e) => {
                warn!(backend = %target, error = %e, "health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned status line per connection.
    async fn start_status_server(status_line: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status_line
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_healthy_backend_200() {
        let target = start_status_server("200 OK").await;
        let checker = HttpHealthCheck::new(Duration::from_secs(5));
        assert!(checker.check(&target).await);
    }

    #[tokio::test]
    async fn test_unhealthy_backend_500() {
        let target = start_status_server("500 Internal Server Error").await;
        let checker = HttpHealthCheck::new(Duration::from_secs(5));
        assert!(!checker.check(&target).await);
    }

    #[tokio::test]
    async fn test_connection_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let checker = HttpHealthCheck::new(Duration::from_secs(5));
        let target = Url::parse(&format!("http://{}", addr)).unwrap();
        assert!(!checker.check(&target).await);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let checker = HttpHealthCheck::new(Duration::from_secs(1));
        let target = Url::parse(&format!("http://{}", addr)).unwrap();
        assert!(!checker.check(&target).await);
    }

    #[tokio::test]
    async fn test_check_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                // Never answer.
                held.push(socket);
            }
        });

        let checker = HttpHealthCheck::new(Duration::from_millis(100));
        let target = Url::parse(&format!("http://{}", addr)).unwrap();
        let err = checker.send_head(&target).await.unwrap_err();
        assert!(err.contains("timeout"));
    }
}
