pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod server;

pub use error::PoolError;
pub use pool::{AddressPool, PoolOptions};
