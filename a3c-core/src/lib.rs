#![warn(missing_docs)]
//! Core of asynchronous advantage actor-critic (A3C).
//!
//! This crate is independent of any deep learning backend. It provides
//!
//! * the interface to environments ([`Env`], [`Obs`], [`Step`], [`EnvFactory`]),
//! * the contract of a differentiable policy-value model ([`PolicyValueModel`]) and of an
//!   optimizer shared by asynchronous workers ([`SharedOptimizer`]),
//! * the per-worker [`Trajectory`] buffer and the n-step [`n_step_returns`] estimator,
//! * records for telemetry ([`record`]) and the error taxonomy ([`error`]).
//!
//! Backends implement [`PolicyValueModel`] and [`SharedOptimizer`]; the asynchronous training
//! loop is built on top of these traits.
pub mod error;
pub mod record;

mod base;
pub use base::{
    Env, EnvFactory, Info, LossInfo, Obs, PolicyValueModel, SharedOptimizer, Step,
};

mod returns;
pub use returns::n_step_returns;

mod trajectory;
pub use trajectory::Trajectory;
