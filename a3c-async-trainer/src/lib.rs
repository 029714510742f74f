#![warn(missing_docs)]
//! Asynchronous advantage actor-critic (A3C) on threads sharing one model.
//!
//! [`Coordinator`] builds the shared model and optimizer, owned by a [`ParameterServer`],
//! and spawns [`Worker`]s on OS threads. Each worker runs its own environment with a private
//! copy of the model, computes gradients on its trajectory and pushes them to the parameter
//! server, which applies them to the shared model under a single lock. Completed episodes are
//! counted in [`SharedCounters`] and reported to the coordinator with [`WorkerMessage`]s
//! over a [`crossbeam_channel`].
//!
//! # Messages
//! * From [`Worker`] to [`Coordinator`]
//!   - [`WorkerMessage::Result`] after each completed episode
//!   - [`WorkerMessage::Shutdown`] when the episode budget is spent
mod checkpoint;
mod coordinator;
mod messages;
mod parameter_server;
mod shared_state;
mod util;
mod worker;
pub use checkpoint::{CheckpointKind, CheckpointMeta, Checkpointer};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorStat};
pub use messages::{EpisodeDiagnostics, ResultRecord, WorkerMessage};
pub use parameter_server::ParameterServer;
pub use shared_state::{RunningReward, SharedCounters};
pub use util::train_async;
pub use worker::{valid_action, worker_stats_fmt, Worker, WorkerConfig, WorkerStat};

#[cfg(test)]
mod test_util;
