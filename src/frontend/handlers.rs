//! Route handlers for the inbound listener.
//!
//! `GET /health` reports how many backends are alive; every other request is
//! proxied through the dispatcher.

use crate::metrics::MetricsCollector;
use crate::proxy::{DispatchError, ProxyRequest, ProxyResponse, RequestDispatcher};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::warn;

/// Path of the health introspection endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Route one inbound request. Bodies over `max_body` bytes get a 413.
pub async fn route<B>(
    req: Request<B>,
    client_addr: Option<SocketAddr>,
    dispatcher: &RequestDispatcher,
    metrics: &MetricsCollector,
    max_body: usize,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let start = Instant::now();
    let method = req.method().clone();

    let response = if method == Method::GET && req.uri().path() == HEALTH_PATH {
        health_response(dispatcher.healthy_backends())
    } else {
        match ProxyRequest::from_request(req, client_addr, max_body).await {
            Ok(request) => proxy_response(dispatcher.handle_request(&request).await),
            Err(e) => {
                warn!(error = %e, "rejected request body");
                empty_response(e.status())
            }
        }
    };

    metrics.record_request(method.as_str(), response.status().as_u16(), start.elapsed());
    Ok(response)
}

/// The `/health` answer: the number of live backends as plain text, with
/// 503 when there are none.
pub fn health_response(healthy: usize) -> Response<Full<Bytes>> {
    let status = if healthy == 0 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut response = Response::new(Full::new(Bytes::from(healthy.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Turn a dispatch outcome into the client response.
pub fn proxy_response(
    result: Result<ProxyResponse, DispatchError>,
) -> Response<Full<Bytes>> {
    match result {
        Ok(response) => response.into_response(),
        Err(e) => empty_response(e.status()),
    }
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
