use crate::WorkerStat;
use std::time::Duration;

/// Stats of [`Coordinator`](crate::Coordinator)`::train()`.
#[derive(Clone, Debug)]
pub struct CoordinatorStat {
    /// The number of episodes received from workers.
    pub episodes: usize,

    /// The number of optimizer steps applied to the shared model.
    pub opt_steps: usize,

    /// Best mean reward over a checkpoint interval.
    pub best_reward: Option<f32>,

    /// Duration of training.
    pub duration: Duration,

    /// Stats of workers that stopped without error, ordered by worker id.
    pub worker_stats: Vec<WorkerStat>,
}

impl CoordinatorStat {
    /// The number of received episodes per second.
    pub fn episodes_per_sec(&self) -> f32 {
        self.episodes as f32 / self.duration.as_secs_f32()
    }

    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "episodes, opt_steps, episodes/sec, best reward, duration\n".to_string();
        s += format!(
            "{}, {}, {}, {:?}, {}\n",
            self.episodes,
            self.opt_steps,
            self.episodes_per_sec(),
            self.best_reward,
            self.duration.as_secs_f32()
        )
        .as_str();
        s
    }
}
