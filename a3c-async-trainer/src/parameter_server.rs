//! Shared model and optimizer.
use a3c_core::{
    error::A3cError, n_step_returns, Env, LossInfo, PolicyValueModel, SharedOptimizer, Trajectory,
};
use anyhow::Result;
use log::trace;
use std::{
    marker::PhantomData,
    sync::{Mutex, MutexGuard},
};

struct Shared<M, O> {
    model: M,
    opt: O,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Owns the shared model and the shared optimizer state.
///
/// Workers push gradients of their private models with [`ParameterServer::sync`]. Loss and
/// gradient computation run on the calling worker's model without any lock; clearing the
/// gradient slots, transplanting gradients, the optimizer step and the copy back to the
/// worker's model run in a single critical section.
///
/// ```mermaid
/// sequenceDiagram
///     participant W as Worker
///     participant P as ParameterServer
///     W->>W: bootstrap value, n-step returns
///     W->>W: compute_loss on local model
///     W->>P: lock
///     P->>P: zero_grad, set_grads, step
///     P->>W: copy shared parameters
///     W->>P: unlock
/// ```
pub struct ParameterServer<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    shared: Mutex<Shared<M, O>>,
    gamma: f32,
    phantom: PhantomData<fn() -> E>,
}

impl<E, M, O> ParameterServer<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    /// Creates a parameter server owning `model` and `opt`.
    pub fn new(model: M, opt: O, gamma: f32) -> Self {
        Self {
            shared: Mutex::new(Shared { model, opt }),
            gamma,
            phantom: PhantomData,
        }
    }

    /// Builds the shared model and an optimizer for it.
    pub fn build(
        model_config: &M::Config,
        opt_config: &O::Config,
        gamma: f32,
        seed: u64,
    ) -> Result<Self> {
        let model = M::build(model_config, seed)?;
        let opt = O::build(opt_config, &model)?;
        Ok(Self::new(model, opt, gamma))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared<M, O>>> {
        self.shared
            .lock()
            .map_err(|_| A3cError::LockPoisoned("parameter server").into())
    }

    /// Discount factor.
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Overwrites the parameters of `local` with the shared parameters.
    pub fn pull(&self, local: &mut M) -> Result<()> {
        let shared = self.lock()?;
        local.copy_params_from(&shared.model)
    }

    /// Applies the gradient of `local`'s loss on `traj` to the shared model, then refreshes
    /// `local`.
    ///
    /// If `terminal` is `false`, returns are bootstrapped with the value of `next_obs` under
    /// `local`.
    pub fn sync(
        &self,
        local: &mut M,
        terminal: bool,
        next_obs: &E::Obs,
        traj: &Trajectory<E::Obs>,
    ) -> Result<LossInfo> {
        if traj.is_empty() {
            return Err(A3cError::EmptyBatch.into());
        }

        let bootstrap = match terminal {
            true => None,
            false => Some(local.value(next_obs)?),
        };
        let returns = n_step_returns(traj.reward(), bootstrap, self.gamma);
        let (loss, grads) = local.compute_loss(traj.obs(), traj.act(), &returns)?;

        {
            let mut shared = self.lock()?;
            let Shared { model, opt } = &mut *shared;
            opt.zero_grad();
            opt.set_grads(grads)?;
            opt.step(model)?;
            local.copy_params_from(model)?;
        }
        trace!("sync: {:?}", loss);

        Ok(loss)
    }

    /// The number of optimizer steps applied to the shared model.
    pub fn n_steps(&self) -> Result<usize> {
        Ok(self.lock()?.opt.n_steps())
    }

    /// Runs `f` on the shared model and optimizer while holding the lock.
    pub fn with_shared<T>(&self, f: impl FnOnce(&mut M, &mut O) -> Result<T>) -> Result<T> {
        let mut shared = self.lock()?;
        let Shared { model, opt } = &mut *shared;
        f(model, opt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{model_config, Model, ScriptedEnv, ScriptedEnvConfig, VecObs};
    use a3c_candle_agent::opt::{Optimizer, OptimizerConfig};
    use std::{sync::Arc, thread};

    type Server = ParameterServer<ScriptedEnv, Model, Optimizer>;

    fn traj(n: usize) -> Trajectory<VecObs> {
        let mut traj = Trajectory::default();
        for i in 0..n {
            traj.push(VecObs::filled(i as f32 * 0.1), i % 2, 1.0);
        }
        traj
    }

    fn params(model: &Model) -> Vec<(String, Vec<f32>)> {
        let data = model.get_varmap().data().lock().unwrap();
        let mut ps = data
            .iter()
            .map(|(k, v)| {
                let t = v.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
                (k.clone(), t)
            })
            .collect::<Vec<_>>();
        ps.sort_by(|a, b| a.0.cmp(&b.0));
        ps
    }

    #[test]
    fn test_local_model_freshness() -> Result<()> {
        let config = ScriptedEnvConfig::default();
        let server = Server::build(&model_config(&config), &OptimizerConfig::default(), 0.9, 0)?;
        let mut local = Model::build(&model_config(&config), 1)?;
        assert_ne!(params(&local), server.with_shared(|m, _| Ok(params(m)))?);

        let before = server.with_shared(|m, _| Ok(params(m)))?;
        server.sync(&mut local, false, &VecObs::filled(0.5), &traj(5))?;
        let after = server.with_shared(|m, _| Ok(params(m)))?;

        assert_ne!(before, after);
        assert_eq!(params(&local), after);
        assert_eq!(server.n_steps()?, 1);
        Ok(())
    }

    #[test]
    fn test_sync_atomicity() -> Result<()> {
        const W: usize = 4;
        const M: usize = 25;
        let config = ScriptedEnvConfig::default();
        let server = Arc::new(Server::build(
            &model_config(&config),
            &OptimizerConfig::default(),
            0.9,
            0,
        )?);

        let handles = (0..W)
            .map(|i| {
                let server = server.clone();
                let config = config.clone();
                thread::spawn(move || -> Result<()> {
                    let mut local = Model::build(&model_config(&config), i as u64)?;
                    server.pull(&mut local)?;
                    for j in 0..M {
                        server.sync(&mut local, j % 3 == 0, &VecObs::filled(0.2), &traj(3))?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap()?;
        }

        assert_eq!(server.n_steps()?, W * M);
        Ok(())
    }

    #[test]
    fn test_sync_rejects_empty_trajectory() -> Result<()> {
        let config = ScriptedEnvConfig::default();
        let server = Server::build(&model_config(&config), &OptimizerConfig::default(), 0.9, 0)?;
        let mut local = Model::build(&model_config(&config), 1)?;
        let err = server
            .sync(&mut local, true, &VecObs::filled(0.0), &Trajectory::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<A3cError>(),
            Some(A3cError::EmptyBatch)
        ));
        assert_eq!(server.n_steps()?, 0);
        Ok(())
    }
}
