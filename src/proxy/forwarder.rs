//! HTTP forwarding to a chosen backend.
//!
//! The inbound request is buffered once into a [`ProxyRequest`] so it can be
//! replayed on every retry, and the upstream response is buffered into a
//! [`ProxyResponse`] so a failed attempt never reaches the client.

use crate::backend::Backend;
use crate::util::{RequestId, REQUEST_ID_HEADER};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// Body size limit used when none is configured.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

type BoxError = Box<dyn StdError + Send + Sync>;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Forwarding error. Every variant counts as a failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream request: {0}")]
    InvalidTarget(String),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] BoxError),

    #[error("upstream body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

/// Failure to buffer an inbound request body.
#[derive(Debug, thiserror::Error)]
pub enum RequestBodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),

    #[error("failed to read request body: {0}")]
    Read(#[source] BoxError),
}

impl RequestBodyError {
    /// Status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestBodyError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RequestBodyError::Read(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query of the inbound URI; the backend supplies the rest.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
    pub request_id: RequestId,
}

impl ProxyRequest {
    /// A bodiless request, mostly useful for tests.
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            client_addr: None,
            request_id: RequestId::new(),
        }
    }

    /// Buffer an inbound request, reading at most `max_body` bytes of body.
    pub async fn from_request<B>(
        req: Request<B>,
        client_addr: Option<SocketAddr>,
        max_body: usize,
    ) -> Result<Self, RequestBodyError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, max_body).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(RequestBodyError::TooLarge(max_body));
            }
            Err(e) => return Err(RequestBodyError::Read(e)),
        };
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            request_id: RequestId::from_headers(&parts.headers),
            method: parts.method,
            path_and_query,
            headers: parts.headers,
            body,
            client_addr,
        })
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// A response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Convert into a response for the client.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Capability that sends one request to one backend.
///
/// Implementations must not retry or fail over; that policy belongs to the
/// dispatcher.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(
        &self,
        request: &ProxyRequest,
        backend: &Backend,
    ) -> Result<ProxyResponse, ForwardError>;
}

/// Forwards over a pooled hyper client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    /// Upper bound for one attempt, response body included.
    timeout: Duration,
    /// Largest upstream response body accepted.
    max_body: usize,
}

impl HttpForwarder {
    /// Create a forwarder whose attempts give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            timeout,
            max_body: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Treat upstream bodies larger than `max_body` bytes as a failed attempt.
    pub fn with_body_limit(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    async fn send(&self, upstream: Request<Full<Bytes>>) -> Result<ProxyResponse, ForwardError> {
        let response = self.client.request(upstream).await?;
        let (mut parts, body) = response.into_parts();
        let body = match Limited::new(body, self.max_body).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(ForwardError::BodyTooLarge(self.max_body));
            }
            Err(e) => return Err(ForwardError::Body(e)),
        };
        strip_hop_by_hop(&mut parts.headers);

        Ok(ProxyResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(
        &self,
        request: &ProxyRequest,
        backend: &Backend,
    ) -> Result<ProxyResponse, ForwardError> {
        let upstream = build_upstream_request(request, backend.target())?;

        match timeout(self.timeout, self.send(upstream)).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        }
    }
}

/// Rewrite the inbound request to target `backend`.
fn build_upstream_request(
    request: &ProxyRequest,
    backend: &Url,
) -> Result<Request<Full<Bytes>>, ForwardError> {
    let authority = authority(backend)?;
    let uri: Uri = format!("{}://{}{}", backend.scheme(), authority, request.path_and_query)
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| ForwardError::InvalidTarget(e.to_string()))?;

    let mut upstream = Request::new(Full::new(request.body.clone()));
    *upstream.method_mut() = request.method.clone();
    *upstream.uri_mut() = uri;
    *upstream.headers_mut() = request.headers.clone();

    let headers = upstream.headers_mut();
    strip_hop_by_hop(headers);

    let host = HeaderValue::from_str(&authority)
        .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;
    headers.insert(HOST, host);
    add_forwarding_headers(headers, request);

    Ok(upstream)
}

fn authority(url: &Url) -> Result<String, ForwardError> {
    let host = url
        .host_str()
        .ok_or_else(|| ForwardError::InvalidTarget(format!("{} has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Add `x-forwarded-for`, `x-real-ip`, and `x-request-id`.
fn add_forwarding_headers(headers: &mut HeaderMap, request: &ProxyRequest) {
    if let Some(client) = request.client_addr {
        let ip = client.ip().to_string();

        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip.clone(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(&X_FORWARDED_FOR, value);
        }
        if let Ok(value) = HeaderValue::from_str(&ip) {
            headers.insert(&X_REAL_IP, value);
        }
    }

    if let Some(value) = request.request_id.header_value() {
        headers.insert(&REQUEST_ID_HEADER, value);
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
