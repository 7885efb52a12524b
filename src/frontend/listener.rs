//! Frontend listener implementation.
//!
//! Accepts inbound HTTP/1.1 connections and serves each one on its own task.
//! On shutdown the listener stops accepting and gives open connections a
//! bounded grace period to finish their in-flight requests.

use crate::frontend::handlers::route;
use crate::metrics::MetricsCollector;
use crate::proxy::{RequestDispatcher, DEFAULT_MAX_BODY_SIZE};
use crate::util::{RequestId, ShutdownListener};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Frontend listener that accepts and handles connections.
pub struct FrontendListener {
    /// TCP listener.
    listener: TcpListener,
    /// Dispatcher shared by every connection.
    dispatcher: RequestDispatcher,
    /// Metrics collector.
    metrics: MetricsCollector,
    /// Largest request body accepted.
    max_body: usize,
}

impl FrontendListener {
    /// Bind the listener.
    pub async fn bind(
        address: SocketAddr,
        dispatcher: RequestDispatcher,
        metrics: MetricsCollector,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        info!(listen = %address, "frontend listener bound");

        Ok(Self {
            listener,
            dispatcher,
            metrics,
            max_body: DEFAULT_MAX_BODY_SIZE,
        })
    }

    /// Answer requests with bodies over `max_body` bytes with a 413.
    pub fn with_body_limit(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown, then drain for at most `grace`.
    pub async fn run(self, mut shutdown: ShutdownListener, grace: Duration) {
        info!("frontend listener starting");
        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("frontend listener shutting down");
                    break;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.serve(stream, addr, &graceful),
                        Err(e) => error!(error = %e, "failed to accept connection"),
                    }
                }
            }
        }

        drop(self.listener);

        tokio::select! {
            _ = graceful.shutdown() => info!("all connections drained"),
            _ = tokio::time::sleep(grace) => {
                warn!(grace_ms = grace.as_millis() as u64, "grace period elapsed with connections still open");
            }
        }
    }

    /// Serve one connection on its own task.
    fn serve(&self, stream: TcpStream, client_addr: SocketAddr, graceful: &GracefulShutdown) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let connection_id = RequestId::short();
        let dispatcher = self.dispatcher.clone();
        let metrics = self.metrics.clone();
        let max_body = self.max_body;

        let service = service_fn(move |req: Request<Incoming>| {
            let dispatcher = dispatcher.clone();
            let metrics = metrics.clone();
            async move { route(req, Some(client_addr), &dispatcher, &metrics, max_body).await }
        });

        let connection = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(TokioIo::new(stream), service);
        let connection = graceful.watch(connection);

        debug!(connection_id = %connection_id, client = %client_addr, "connection accepted");

        tokio::spawn(async move {
            match connection.await {
                Ok(()) => debug!(connection_id = %connection_id, "connection closed"),
                Err(e) => debug!(connection_id = %connection_id, error = %e, "connection error"),
            }
        });
    }
}
