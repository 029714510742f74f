use super::ActorCriticConfig;
use crate::{
    model::SubModel1,
    util::{copy_vars, shape_str, InDim, NamedTensors, OutDim},
};
use a3c_core::{error::A3cError, Env, LossInfo, PolicyValueModel};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{
    ops::{log_softmax, softmax},
    VarBuilder, VarMap,
};
use log::{info, trace};
use rand::{distributions::WeightedIndex, rngs::SmallRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Policy network `pi` and value network `v` sharing one [`VarMap`].
///
/// Parameters are named `pi.*` and `v.*`. Two instances built from the same configuration
/// have the same parameter names and shapes, which is what gradient transplantation and
/// [`PolicyValueModel::copy_params_from`] rely on.
pub struct ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    device: Device,
    pi: P,
    v: V,
    in_dim: usize,
    n_actions: usize,
    rng: SmallRng,
}

impl<P, V> ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + InDim + Clone,
    V::Config: DeserializeOwned + Serialize + OutDim + InDim + Clone,
{
    /// Builds the networks on a fresh [`VarMap`].
    pub fn build(config: &ActorCriticConfig<P::Config, V::Config>, seed: u64) -> Result<Self> {
        let pi_config = config
            .pi_config
            .clone()
            .context("pi_config is not set")?;
        let v_config = config.v_config.clone().context("v_config is not set")?;

        let in_dim = pi_config.get_in_dim();
        let n_actions = pi_config.get_out_dim();
        if v_config.get_in_dim() != in_dim {
            return Err(A3cError::Config(format!(
                "input dimensions of pi ({}) and v ({}) differ",
                in_dim,
                v_config.get_in_dim()
            ))
            .into());
        }
        if v_config.get_out_dim() != 1 {
            return Err(A3cError::Config(format!(
                "output dimension of v must be 1, got {}",
                v_config.get_out_dim()
            ))
            .into());
        }
        if n_actions == 0 {
            return Err(A3cError::Config("number of actions must be positive".into()).into());
        }

        let device = config.device.to_candle()?;
        let varmap = VarMap::new();
        let (pi, v) = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            let pi = P::build(vb.pp("pi"), pi_config)?;
            let v = V::build(vb.pp("v"), v_config)?;
            (pi, v)
        };

        Ok(Self {
            varmap,
            device,
            pi,
            v,
            in_dim,
            n_actions,
            rng: SmallRng::seed_from_u64(seed),
        })
    }
}

impl<P, V> ActorCritic<P, V>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
{
    /// Returns the variables of the model.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Stacks observations into a `(batch, in_dim)` tensor.
    fn batch<O: Clone + Into<Tensor>>(&self, obs: &[O]) -> Result<Tensor> {
        if obs.is_empty() {
            return Err(A3cError::EmptyBatch.into());
        }

        let xs = obs
            .iter()
            .map(|o| {
                let x: Tensor = o.clone().into();
                let x = x.flatten_all()?;
                if x.dims1()? != self.in_dim {
                    return Err(A3cError::ShapeMismatch {
                        expected: format!("[{}]", self.in_dim),
                        actual: shape_str(&x),
                    }
                    .into());
                }
                Ok(x)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Tensor::stack(&xs, 0)?
            .to_dtype(DType::F32)?
            .to_device(&self.device)?)
    }

    /// Policy logits `(batch, n_actions)` and values `(batch,)`.
    fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let n = xs.dims()[0];
        let logits = self.pi.forward(xs)?;
        let values = self.v.forward(xs)?.reshape(n)?;
        Ok((logits, values))
    }

    /// Action probabilities of an observation.
    pub fn probs<O: Clone + Into<Tensor>>(&self, obs: &O) -> Result<Vec<f32>> {
        let xs = self.batch(std::slice::from_ref(obs))?;
        let logits = self.pi.forward(&xs)?;
        Ok(softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()?)
    }
}

impl<E, P, V> PolicyValueModel<E> for ActorCritic<P, V>
where
    E: Env,
    E::Obs: Into<Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor> + Send,
    V: SubModel1<Input = Tensor, Output = Tensor> + Send,
    P::Config: DeserializeOwned + Serialize + OutDim + InDim + Clone + Send + Sync,
    V::Config: DeserializeOwned + Serialize + OutDim + InDim + Clone + Send + Sync,
{
    type Config = ActorCriticConfig<P::Config, V::Config>;
    type Grads = NamedTensors;

    fn build(config: &Self::Config, seed: u64) -> Result<Self> {
        ActorCritic::build(config, seed)
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn sample_action(&mut self, obs: &E::Obs) -> Result<usize> {
        let probs = self.probs(obs)?;
        let dist = WeightedIndex::new(&probs)
            .with_context(|| format!("invalid action probabilities {:?}", probs))?;
        Ok(self.rng.sample(dist))
    }

    fn value(&self, obs: &E::Obs) -> Result<f32> {
        let xs = self.batch(std::slice::from_ref(obs))?;
        let (_, values) = self.forward(&xs)?;
        Ok(values.get(0)?.to_scalar::<f32>()?)
    }

    fn compute_loss(
        &self,
        obs: &[E::Obs],
        act: &[usize],
        returns: &[f32],
    ) -> Result<(LossInfo, Self::Grads)> {
        let n = obs.len();
        if act.len() != n || returns.len() != n {
            return Err(A3cError::ShapeMismatch {
                expected: format!("{} actions and returns", n),
                actual: format!("{} actions, {} returns", act.len(), returns.len()),
            }
            .into());
        }
        if let Some(a) = act.iter().find(|&&a| a >= self.n_actions) {
            return Err(A3cError::ShapeMismatch {
                expected: format!("action < {}", self.n_actions),
                actual: format!("{}", a),
            }
            .into());
        }

        let xs = self.batch(obs)?;
        let (logits, values) = self.forward(&xs)?;
        let returns = Tensor::from_slice(returns, n, &self.device)?;
        let act = Tensor::from_vec(
            act.iter().map(|&a| a as u32).collect::<Vec<_>>(),
            (n, 1),
            &self.device,
        )?;

        let adv = (returns - &values)?;
        let value_loss = adv.sqr()?;
        let log_pa = log_softmax(&logits, D::Minus1)?
            .gather(&act, 1)?
            .reshape(n)?;
        let policy_loss = (log_pa * adv.detach())?.neg()?;
        let loss = (&value_loss + &policy_loss)?.mean_all()?;

        let grads = NamedTensors::from_grads(&self.varmap, &loss.backward()?)?;
        let info = LossInfo {
            loss: loss.to_scalar::<f32>()?,
            value_loss: value_loss.mean_all()?.to_scalar::<f32>()?,
            policy_loss: policy_loss.mean_all()?.to_scalar::<f32>()?,
            advantage: adv.mean_all()?.to_scalar::<f32>()?,
        };
        trace!("{:?}", info);

        Ok((info, grads))
    }

    fn copy_params_from(&mut self, src: &Self) -> Result<()> {
        copy_vars(&self.varmap, &src.varmap)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        info!("Save actor-critic model to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        info!("Load actor-critic model from {:?}", path);
        Ok(())
    }
}
