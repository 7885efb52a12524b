//! Health checking for backend servers.
//!
//! The [`HealthMonitor`] is the only path that can bring a backend back to
//! life after the dispatcher demotes it.

mod checker;
mod monitor;

pub use checker::{HealthCheck, HttpHealthCheck};
pub use monitor::{HealthMonitor, MonitorHandle, MIN_INTERVAL};
