//! Inbound HTTP listener and route handlers.
//!
//! `GET /health` is answered locally; everything else goes through the
//! request dispatcher.

mod handlers;
mod listener;

pub use handlers::{health_response, proxy_response, route, HEALTH_PATH};
pub use listener::FrontendListener;
