//! Request forwarding and retrying dispatch.

mod dispatcher;
mod forwarder;

pub use dispatcher::{DispatchError, RequestDispatcher, MAX_ATTEMPTS};
pub use forwarder::{
    Forward, ForwardError, HttpForwarder, ProxyRequest, ProxyResponse, RequestBodyError,
    DEFAULT_MAX_BODY_SIZE,
};
