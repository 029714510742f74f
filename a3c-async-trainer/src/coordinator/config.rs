use crate::RunningReward;
use a3c_core::error::A3cError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

fn default_n_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration of [`Coordinator`](crate::Coordinator).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// The number of workers. Defaults to the available parallelism of the host.
    pub n_workers: usize,

    /// Discount factor.
    pub gamma: f32,

    /// Interval of synchronization in environment steps of each worker.
    pub update_global_delay: usize,

    /// Interval of checkpointing in received episodes.
    pub checkpoint_interval: usize,

    /// Training stops once this many episodes are completed.
    pub max_episodes: usize,

    /// The maximum number of steps in an episode.
    pub max_length: usize,

    /// Reward recorded on terminal transitions. `None` keeps the environment's reward.
    pub terminal_reward: Option<f32>,

    /// If `true`, episodes reaching `max_length` are counted as completed.
    pub count_truncated: bool,

    /// How the global running reward is updated.
    pub running_reward: RunningReward,

    /// If `true`, worker 0 renders its environment.
    pub render: bool,

    /// If `true`, no checkpoint is loaded at startup.
    pub skip_load: bool,

    /// If `true`, the best checkpoint is loaded instead of the latest one.
    pub play: bool,

    /// Where to save checkpoints. `None` disables persistence.
    pub model_dir: Option<String>,

    /// Timeout of waiting messages before checking liveness of workers, in milliseconds.
    pub liveness_check_interval_ms: u64,

    /// Random seed. Worker `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            n_workers: default_n_workers(),
            gamma: 0.9,
            update_global_delay: 20,
            checkpoint_interval: 10,
            max_episodes: 10000,
            max_length: 1000,
            terminal_reward: Some(-1.0),
            count_truncated: false,
            running_reward: RunningReward::Latest,
            render: false,
            skip_load: false,
            play: false,
            model_dir: None,
            liveness_check_interval_ms: 1000,
            seed: 42,
        }
    }
}

impl CoordinatorConfig {
    /// Constructs [`CoordinatorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CoordinatorConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Checks values before any worker starts.
    pub fn validate(&self) -> Result<()> {
        let err = |msg: &str| -> Result<()> { Err(A3cError::Config(msg.to_string()).into()) };

        if self.n_workers == 0 {
            return err("n_workers must be positive");
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return err("gamma must be in (0, 1)");
        }
        if self.update_global_delay == 0 {
            return err("update_global_delay must be positive");
        }
        if self.checkpoint_interval == 0 {
            return err("checkpoint_interval must be positive");
        }
        if self.max_length == 0 {
            return err("max_length must be positive");
        }
        if self.liveness_check_interval_ms == 0 {
            return err("liveness_check_interval_ms must be positive");
        }
        Ok(())
    }

    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the interval of synchronization.
    pub fn update_global_delay(mut self, v: usize) -> Self {
        self.update_global_delay = v;
        self
    }

    /// Sets the interval of checkpointing.
    pub fn checkpoint_interval(mut self, v: usize) -> Self {
        self.checkpoint_interval = v;
        self
    }

    /// Sets the number of episodes to be completed.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = v;
        self
    }

    /// Sets the maximum number of steps in an episode.
    pub fn max_length(mut self, v: usize) -> Self {
        self.max_length = v;
        self
    }

    /// Sets the reward of terminal transitions.
    pub fn terminal_reward(mut self, v: Option<f32>) -> Self {
        self.terminal_reward = v;
        self
    }

    /// Sets if truncated episodes are counted.
    pub fn count_truncated(mut self, v: bool) -> Self {
        self.count_truncated = v;
        self
    }

    /// Sets the update rule of the running reward.
    pub fn running_reward(mut self, v: RunningReward) -> Self {
        self.running_reward = v;
        self
    }

    /// Sets the render flag.
    pub fn render(mut self, v: bool) -> Self {
        self.render = v;
        self
    }

    /// Sets the skip-load flag.
    pub fn skip_load(mut self, v: bool) -> Self {
        self.skip_load = v;
        self
    }

    /// Sets the play flag.
    pub fn play(mut self, v: bool) -> Self {
        self.play = v;
        self
    }

    /// Sets the directory where checkpoints are saved.
    pub fn model_dir<T: Into<String>>(mut self, model_dir: T) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Sets the liveness check interval in milliseconds.
    pub fn liveness_check_interval_ms(mut self, v: u64) -> Self {
        self.liveness_check_interval_ms = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }
}
