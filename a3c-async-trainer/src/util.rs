//! Utility function.
use crate::{Coordinator, CoordinatorConfig, CoordinatorStat};
use a3c_core::{Env, EnvFactory, PolicyValueModel, SharedOptimizer};
use a3c_tensorboard::TensorboardRecorder;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Runs asynchronous training and records episode results for tensorboard.
///
/// * `logdir` - Directory where tensorboard logs are written.
/// * `config` - Configuration of [`Coordinator`]. Checkpoints are saved in its `model_dir`.
/// * `env_factory` - Configurations of environments assigned to workers.
/// * `model_config` - Configuration of the shared model and of the private copies.
/// * `opt_config` - Configuration of the shared optimizer.
pub fn train_async<E, M, O, P>(
    logdir: &P,
    config: &CoordinatorConfig,
    env_factory: EnvFactory<E::Config>,
    model_config: &M::Config,
    opt_config: &O::Config,
) -> Result<CoordinatorStat>
where
    E: Env + 'static,
    E::Config: Send + 'static,
    M: PolicyValueModel<E> + 'static,
    M::Config: 'static,
    O: SharedOptimizer<M, Grads = M::Grads> + 'static,
    P: AsRef<Path>,
{
    let mut recorder = TensorboardRecorder::new(logdir);
    let mut coordinator =
        Coordinator::<E, M, O>::build(config, env_factory, model_config, opt_config)?;
    info!(
        "Training on {} with {} workers",
        coordinator.env_name(),
        config.n_workers
    );

    coordinator.train(&mut recorder)
}
