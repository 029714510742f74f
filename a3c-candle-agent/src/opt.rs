//! Optimizers with gradient slots, shared by asynchronous workers.
use crate::{
    actor_critic::ActorCritic,
    model::SubModel1,
    util::{lock_vars, NamedTensors},
};
use a3c_core::{error::A3cError, SharedOptimizer};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::ParamsAdamW;
use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

const STEP_KEY: &str = "step";

/// Configuration of optimizer for training the shared model.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// RMSprop optimizer.
    ///
    /// `sq = alpha * sq + (1 - alpha) * g^2`, `p = p - lr * g / (sqrt(sq) + eps)`.
    RmsProp {
        lr: f64,
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_eps")]
        eps: f64,
    },

    /// AdamW optimizer.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },
}

fn default_alpha() -> f64 {
    0.99
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::RmsProp {
            lr: 1e-4,
            alpha: default_alpha(),
            eps: default_eps(),
        }
    }
}

impl OptimizerConfig {
    /// Names of the per-parameter statistics.
    fn state_prefixes(&self) -> &'static [&'static str] {
        match self {
            Self::RmsProp { .. } => &["sq"],
            Self::AdamW { .. } => &["m", "v"],
        }
    }

    /// Constructs [`Optimizer`] for the variables of a [`VarMap`](candle_nn::VarMap).
    ///
    /// Statistics start at zero.
    pub fn build(&self, varmap: &candle_nn::VarMap) -> Result<Optimizer> {
        let vars = lock_vars(varmap)?;
        let mut shapes = HashMap::new();
        let mut state = HashMap::new();
        let mut device = Device::Cpu;

        for (name, var) in vars.iter() {
            let t = var.as_tensor();
            for prefix in self.state_prefixes() {
                state.insert(format!("{}/{}", prefix, name), t.zeros_like()?);
            }
            shapes.insert(name.clone(), t.dims().to_vec());
            device = t.device().clone();
        }

        Ok(Optimizer {
            config: self.clone(),
            shapes,
            state,
            grads: None,
            n_steps: 0,
            device,
        })
    }
}

/// Optimizer holding one gradient slot and its statistics per parameter.
///
/// Gradients are transplanted into the slots with [`Optimizer::set_grads`] and applied to
/// the variables of a [`VarMap`](candle_nn::VarMap) with [`Optimizer::step_vars`]. Parameters
/// are identified by their names.
pub struct Optimizer {
    config: OptimizerConfig,
    shapes: HashMap<String, Vec<usize>>,
    state: HashMap<String, Tensor>,
    grads: Option<NamedTensors>,
    n_steps: usize,
    device: Device,
}

impl Optimizer {
    /// Clears the gradient slots.
    pub fn zero_grad(&mut self) {
        self.grads = None;
    }

    /// Copies gradients into the slots after checking names and shapes.
    pub fn set_grads(&mut self, grads: NamedTensors) -> Result<()> {
        let mut slots = HashMap::with_capacity(self.shapes.len());
        for (name, shape) in self.shapes.iter() {
            let g = grads
                .get(name)
                .ok_or_else(|| A3cError::MissingGradient(name.clone()))?;
            if g.dims() != shape.as_slice() {
                return Err(A3cError::ShapeMismatch {
                    expected: format!("{} {:?}", name, shape),
                    actual: format!("{:?}", g.dims()),
                }
                .into());
            }
            slots.insert(name.clone(), g.to_device(&self.device)?);
        }
        self.grads = Some(NamedTensors {
            named_tensors: slots,
        });
        Ok(())
    }

    /// Returns `true` if the slots hold gradients.
    pub fn has_grads(&self) -> bool {
        self.grads.is_some()
    }

    /// Applies the gradients in the slots to the variables and empties the slots.
    pub fn step_vars(&mut self, varmap: &candle_nn::VarMap) -> Result<()> {
        let grads = self.grads.take().ok_or(A3cError::EmptyGradientSlot)?;
        let vars = lock_vars(varmap)?;
        let t = (self.n_steps + 1) as i32;

        for (name, var) in vars.iter() {
            let g = grads.check(name, var.as_tensor())?;
            let p = var.as_tensor();
            let p_new = match self.config {
                OptimizerConfig::RmsProp { lr, alpha, eps } => {
                    let key = format!("sq/{}", name);
                    let sq = self.state(&key)?;
                    let sq = (sq.affine(alpha, 0.)? + g.sqr()?.affine(1. - alpha, 0.)?)?;
                    let d = g.div(&sq.sqrt()?.affine(1., eps)?)?;
                    self.state.insert(key, sq);
                    (p - d.affine(lr, 0.)?)?
                }
                OptimizerConfig::AdamW {
                    lr,
                    beta1,
                    beta2,
                    eps,
                    weight_decay,
                } => {
                    let (key_m, key_v) = (format!("m/{}", name), format!("v/{}", name));
                    let m = self.state(&key_m)?;
                    let v = self.state(&key_v)?;
                    let m = (m.affine(beta1, 0.)? + g.affine(1. - beta1, 0.)?)?;
                    let v = (v.affine(beta2, 0.)? + g.sqr()?.affine(1. - beta2, 0.)?)?;
                    let m_hat = m.affine(1. / (1. - beta1.powi(t)), 0.)?;
                    let v_hat = v.affine(1. / (1. - beta2.powi(t)), 0.)?;
                    let d = m_hat.div(&v_hat.sqrt()?.affine(1., eps)?)?;
                    self.state.insert(key_m, m);
                    self.state.insert(key_v, v);
                    (p.affine(1. - lr * weight_decay, 0.)? - d.affine(lr, 0.)?)?
                }
            };
            var.set(&p_new)?;
        }

        self.n_steps += 1;
        Ok(())
    }

    fn state(&self, key: &str) -> Result<Tensor> {
        self.state
            .get(key)
            .cloned()
            .with_context(|| format!("no optimizer state {}", key))
    }

    /// The number of steps applied so far.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Saves the statistics and the step count in safetensors format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tensors = self.state.clone();
        let step = Tensor::new(&[self.n_steps as u32], &Device::Cpu)?;
        tensors.insert(STEP_KEY.to_string(), step);
        candle_core::safetensors::save(&tensors, path)?;
        info!("Save optimizer to {:?}", path);
        Ok(())
    }

    /// Loads the statistics and the step count.
    ///
    /// The file must contain a tensor of the same shape for every statistic.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let mut tensors = candle_core::safetensors::load(path, &self.device)?;
        let step = tensors
            .remove(STEP_KEY)
            .with_context(|| format!("no {} in {:?}", STEP_KEY, path))?;
        let n_steps = step.to_vec1::<u32>()?.first().copied().unwrap_or(0) as usize;

        let mut state = HashMap::with_capacity(self.state.len());
        for (key, t) in self.state.iter() {
            let src = tensors
                .remove(key)
                .with_context(|| format!("no {} in {:?}", key, path))?;
            if src.dims() != t.dims() {
                return Err(A3cError::ShapeMismatch {
                    expected: format!("{} {:?}", key, t.dims()),
                    actual: format!("{:?}", src.dims()),
                }
                .into());
            }
            state.insert(key.clone(), src);
        }

        self.state = state;
        self.n_steps = n_steps;
        self.grads = None;
        info!("Load optimizer from {:?}", path);
        Ok(())
    }
}

impl<P, V> SharedOptimizer<ActorCritic<P, V>> for Optimizer
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    V: SubModel1<Input = Tensor, Output = Tensor>,
{
    type Config = OptimizerConfig;
    type Grads = NamedTensors;

    fn build(config: &Self::Config, model: &ActorCritic<P, V>) -> Result<Self> {
        config.build(model.get_varmap())
    }

    fn zero_grad(&mut self) {
        Optimizer::zero_grad(self)
    }

    fn set_grads(&mut self, grads: Self::Grads) -> Result<()> {
        Optimizer::set_grads(self, grads)
    }

    fn step(&mut self, model: &ActorCritic<P, V>) -> Result<()> {
        self.step_vars(model.get_varmap())
    }

    fn n_steps(&self) -> usize {
        self.n_steps
    }

    fn save(&self, path: &Path) -> Result<()> {
        Optimizer::save(self, path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        Optimizer::load(self, path)
    }
}
