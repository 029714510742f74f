//! Core functionalities.
mod env;
mod env_factory;
mod model;
mod optimizer;
mod step;
pub use env::Env;
pub use env_factory::EnvFactory;
pub use model::{LossInfo, PolicyValueModel};
pub use optimizer::SharedOptimizer;
use std::fmt::Debug;
pub use step::{Info, Step};

/// An observation of an environment.
///
/// Observations are collected into a [`Trajectory`](crate::Trajectory) by a worker and
/// batched by the model when computing the loss, so they must be cheaply cloneable and
/// movable across threads.
pub trait Obs: Clone + Debug + Send {
    /// Shape of the observation, excluding the batch dimension.
    fn shape(&self) -> Vec<usize>;
}
