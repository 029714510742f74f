//! Coordinator owning the shared state and draining the results channel.
mod base;
mod config;
mod stat;
pub use base::Coordinator;
pub use config::CoordinatorConfig;
pub use stat::CoordinatorStat;
