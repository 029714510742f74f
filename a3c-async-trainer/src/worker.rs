//! Worker running an environment-interaction loop on its own thread.
mod base;
mod config;
mod stat;
pub use base::{valid_action, Worker};
pub use config::WorkerConfig;
pub use stat::{worker_stats_fmt, WorkerStat};
