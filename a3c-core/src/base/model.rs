//! Differentiable policy-value model.
use super::Env;
use anyhow::Result;
use std::path::Path;

/// Diagnostics of a single loss evaluation, averaged over the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossInfo {
    /// Mean of value loss plus policy loss. This is the value being differentiated.
    pub loss: f32,

    /// Mean of squared advantages.
    pub value_loss: f32,

    /// Mean of `-log pi(a|s) * advantage`.
    pub policy_loss: f32,

    /// Mean advantage, `target_return - predicted_value`.
    pub advantage: f32,
}

/// A model with a policy head over a discrete action set and a state-value head.
///
/// A training run holds one instance as the shared model and one private instance per
/// worker. The loss is always differentiated with respect to the parameters of the instance
/// it is evaluated on; the resulting gradients are returned as [`Self::Grads`], keyed by
/// parameter identity, so that they can be transplanted into another instance with the
/// same parameter structure through a [`SharedOptimizer`](crate::SharedOptimizer).
pub trait PolicyValueModel<E: Env>: Send {
    /// Configuration of the model.
    type Config: Clone + Send + Sync;

    /// Gradients of the loss, keyed by parameter identity.
    type Grads: Send;

    /// Builds a model. `seed` initializes the random generator for action sampling.
    fn build(config: &Self::Config, seed: u64) -> Result<Self>
    where
        Self: Sized;

    /// Number of outputs of the policy head.
    fn n_actions(&self) -> usize;

    /// Samples an action from the categorical distribution given by the policy head.
    ///
    /// Evaluates the model in inference mode and does not touch the parameters.
    fn sample_action(&mut self, obs: &E::Obs) -> Result<usize>;

    /// Returns the state-value estimate of an observation.
    fn value(&self, obs: &E::Obs) -> Result<f32>;

    /// Computes the actor-critic loss and its gradients.
    ///
    /// `obs`, `act` and `returns` must have the same length, which must be non-zero.
    /// The advantage is treated as a constant in the policy term.
    fn compute_loss(
        &self,
        obs: &[E::Obs],
        act: &[usize],
        returns: &[f32],
    ) -> Result<(LossInfo, Self::Grads)>;

    /// Overwrites every parameter with the value of the corresponding parameter of `src`.
    fn copy_params_from(&mut self, src: &Self) -> Result<()>;

    /// Saves the parameters.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
