//! relaylb - an HTTP reverse-proxy load balancer
//!
//! This crate provides:
//! - A static backend pool with round-robin and least-connections selection
//! - Active health checking, one cancellable task per backend
//! - Retrying dispatch with passive demotion of failing backends
//! - Prometheus metrics

pub mod backend;
pub mod config;
pub mod frontend;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod state;
pub mod util;

pub use config::Config;
pub use state::AppState;
