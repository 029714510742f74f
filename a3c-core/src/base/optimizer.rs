//! Optimizer shared by asynchronous workers.
use anyhow::Result;
use std::path::Path;

/// Gradient-update rule applied to a shared model `M`.
///
/// The optimizer owns one gradient slot per parameter of the shared model. An update is a
/// two-phase operation: gradients computed on another instance are first transplanted into
/// the slots with [`SharedOptimizer::set_grads`], then [`SharedOptimizer::step`] applies them
/// to the shared parameters and updates the per-parameter statistics.
///
/// Neither the slots nor the statistics tolerate interleaved updates; callers must serialize
/// the sequence `zero_grad`, `set_grads`, `step`.
pub trait SharedOptimizer<M>: Send {
    /// Configuration of the optimizer.
    type Config: Clone + Send + Sync;

    /// Gradients keyed by parameter identity.
    type Grads;

    /// Builds the optimizer state for the parameters of `model`.
    fn build(config: &Self::Config, model: &M) -> Result<Self>
    where
        Self: Sized;

    /// Clears the gradient slots.
    fn zero_grad(&mut self);

    /// Copies gradients into the gradient slots.
    ///
    /// Fails if a parameter of the shared model has no corresponding gradient or the shapes
    /// differ.
    fn set_grads(&mut self, grads: Self::Grads) -> Result<()>;

    /// Applies the gradients in the slots to the parameters of `model`.
    fn step(&mut self, model: &M) -> Result<()>;

    /// The number of steps applied so far.
    fn n_steps(&self) -> usize;

    /// Saves the optimizer state.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads the optimizer state.
    fn load(&mut self, path: &Path) -> Result<()>;
}
