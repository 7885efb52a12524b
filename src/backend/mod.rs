//! Backend pool management and load balancing algorithms.

pub mod algorithms;
mod pool;
mod router;
mod server;

pub use pool::ServerPool;
pub use router::BackendSelector;
pub use server::{Backend, ConnectionGuard};
