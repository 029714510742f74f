//! Environment.
use super::{Info, Obs, Step};
use anyhow::Result;

/// Represents an environment with a discrete action set.
///
/// Each worker owns a private instance built from [`Env::Config`]; instances are never
/// shared between threads, so implementors need not be `Send` or `Sync`.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step with the action of the given index.
    ///
    /// `act` is always in `0..self.n_actions()`.
    fn step(&mut self, act: usize) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Renders the current state. Does nothing by default.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }

    /// Shape of observations, excluding the batch dimension.
    fn obs_shape(&self) -> Vec<usize>;

    /// Number of elements of an observation.
    fn n_obs(&self) -> usize {
        self.obs_shape().iter().product()
    }

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Name of the environment, used to key checkpoints.
    fn name(&self) -> String;
}
