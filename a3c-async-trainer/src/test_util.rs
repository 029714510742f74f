//! Scripted environments and tiny models for tests.
use a3c_candle_agent::{
    actor_critic::{ActorCritic, ActorCriticConfig},
    mlp::{Mlp, MlpConfig},
};
use a3c_core::{Env, Obs, Step};
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::sync::{Arc, Mutex};

pub const OBS_DIM: usize = 4;

pub type Model = ActorCritic<Mlp, Mlp>;

#[derive(Clone, Debug)]
pub struct VecObs(pub Vec<f32>);

impl VecObs {
    pub fn filled(x: f32) -> Self {
        Self(vec![x; OBS_DIM])
    }
}

impl Obs for VecObs {
    fn shape(&self) -> Vec<usize> {
        vec![self.0.len()]
    }
}

impl From<VecObs> for Tensor {
    fn from(obs: VecObs) -> Tensor {
        let n = obs.0.len();
        Tensor::from_vec(obs.0, n, &Device::Cpu).unwrap()
    }
}

/// Episodes of `episode_len` steps with a constant reward.
#[derive(Clone, Debug)]
pub struct ScriptedEnvConfig {
    pub obs_dim: usize,
    pub n_actions: usize,
    pub episode_len: usize,
    pub reward: f32,

    /// `step` fails once this many steps were taken.
    pub fail_after: Option<usize>,

    /// Actions passed to `step`.
    pub actions: Arc<Mutex<Vec<usize>>>,
    pub name: String,
}

impl Default for ScriptedEnvConfig {
    fn default() -> Self {
        Self {
            obs_dim: OBS_DIM,
            n_actions: 2,
            episode_len: 3,
            reward: 5.0,
            fail_after: None,
            actions: Arc::new(Mutex::new(vec![])),
            name: "scripted".to_string(),
        }
    }
}

pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    t: usize,
    total: usize,
}

impl ScriptedEnv {
    fn obs(&self) -> VecObs {
        let x = self.t as f32 / self.config.episode_len as f32;
        VecObs(vec![x; self.config.obs_dim])
    }
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;
    type Obs = VecObs;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            t: 0,
            total: 0,
        })
    }

    fn reset(&mut self) -> Result<VecObs> {
        self.t = 0;
        Ok(self.obs())
    }

    fn step(&mut self, act: usize) -> Result<Step<Self>> {
        self.config.actions.lock().unwrap().push(act);
        self.total += 1;
        if let Some(n) = self.config.fail_after {
            if self.total > n {
                return Err(anyhow!("scripted failure"));
            }
        }

        self.t += 1;
        let done = self.t >= self.config.episode_len;
        Ok(Step::new(self.obs(), self.config.reward, done, ()))
    }

    fn obs_shape(&self) -> Vec<usize> {
        vec![self.config.obs_dim]
    }

    fn n_actions(&self) -> usize {
        self.config.n_actions
    }

    fn name(&self) -> String {
        self.config.name.clone()
    }
}

pub fn model_config_with(
    obs_dim: usize,
    n_actions: usize,
) -> ActorCriticConfig<MlpConfig, MlpConfig> {
    ActorCriticConfig::default()
        .pi_config(MlpConfig::new(obs_dim, vec![8], n_actions))
        .v_config(MlpConfig::new(obs_dim, vec![8], 1))
}

pub fn model_config(config: &ScriptedEnvConfig) -> ActorCriticConfig<MlpConfig, MlpConfig> {
    model_config_with(config.obs_dim, config.n_actions)
}
