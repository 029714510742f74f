//! Asynchronous advantage actor-critic (A3C) in Rust.
//!
//! This crate re-exports the crates of the workspace and provides a small environment for
//! demos and tests:
//!
//! * [a3c-core](a3c_core) provides the interface to environments, the contract of the
//!   policy-value model and the shared optimizer, n-step returns and records.
//! * [a3c-candle-agent](a3c_candle_agent) implements the actor-critic model and the shared
//!   optimizers with [candle](https://crates.io/crates/candle-core).
//! * [a3c-async-trainer](a3c_async_trainer) runs workers on threads that update a shared
//!   model through a parameter server.
//! * [a3c-tensorboard](a3c_tensorboard) writes episode results as TensorBoard scalars.
//! * [`cartpole`] is a pure-Rust cart-pole environment.
pub mod cartpole;
pub use a3c_async_trainer as async_trainer;
pub use a3c_candle_agent as candle_agent;
pub use a3c_core as core;
pub use a3c_tensorboard as tensorboard;
