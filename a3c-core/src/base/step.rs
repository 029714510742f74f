//! Environment step.
use super::Env;

/// Additional information to `Obs` and reward.
pub trait Info {}

impl Info for () {}

/// Represents a next observation, reward and done flag emitted by [`Env::step`].
pub struct Step<E: Env> {
    /// Observation after the step.
    pub obs: E::Obs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode is terminated.
    pub is_done: bool,

    /// Information defined by user.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Obs, reward: f32, is_done: bool, info: E::Info) -> Self {
        Step {
            obs,
            reward,
            is_done,
            info,
        }
    }
}
