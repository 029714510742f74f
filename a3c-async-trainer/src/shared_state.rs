//! Counters shared by all workers.
use a3c_core::error::A3cError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// How the global running reward follows completed episodes.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub enum RunningReward {
    /// Overwritten by the reward of the most recently completed episode.
    Latest,

    /// Exponential moving average, `alpha * reward + (1 - alpha) * running`.
    ///
    /// The first completed episode initializes the average.
    MovingAverage {
        /// Weight of the latest episode.
        alpha: f32,
    },
}

impl Default for RunningReward {
    fn default() -> Self {
        Self::Latest
    }
}

impl RunningReward {
    /// Returns the running reward after an episode with `reward`.
    pub fn update(&self, running: Option<f32>, reward: f32) -> f32 {
        match (self, running) {
            (Self::Latest, _) | (Self::MovingAverage { .. }, None) => reward,
            (Self::MovingAverage { alpha }, Some(r)) => alpha * reward + (1.0 - alpha) * r,
        }
    }
}

/// Global episode counter and running reward.
///
/// Each value has its own lock, and is only changed through [`SharedCounters::complete_episode`].
pub struct SharedCounters {
    episodes: Mutex<usize>,
    running_reward: Mutex<Option<f32>>,
    mode: RunningReward,
}

fn lock<'a, T>(m: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|_| A3cError::LockPoisoned(name).into())
}

impl SharedCounters {
    /// Creates counters starting at `episodes`, e.g., restored from a checkpoint.
    pub fn new(episodes: usize, mode: RunningReward) -> Self {
        Self {
            episodes: Mutex::new(episodes),
            running_reward: Mutex::new(None),
            mode,
        }
    }

    /// The number of completed episodes.
    pub fn episodes(&self) -> Result<usize> {
        Ok(*lock(&self.episodes, "episode counter")?)
    }

    /// The running reward, `None` before the first completed episode.
    pub fn running_reward(&self) -> Result<Option<f32>> {
        Ok(*lock(&self.running_reward, "running reward")?)
    }

    /// Counts a completed episode and updates the running reward.
    ///
    /// Returns the episode counter and the running reward right after the update.
    pub fn complete_episode(&self, reward: f32) -> Result<(usize, f32)> {
        let episode = {
            let mut episodes = lock(&self.episodes, "episode counter")?;
            *episodes += 1;
            *episodes
        };
        let running_reward = {
            let mut running_reward = lock(&self.running_reward, "running reward")?;
            let r = self.mode.update(*running_reward, reward);
            *running_reward = Some(r);
            r
        };
        Ok((episode, running_reward))
    }
}
