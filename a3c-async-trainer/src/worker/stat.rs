use std::time::Duration;

/// Stats of the interaction loop in each [`Worker`](crate::Worker).
#[derive(Clone, Debug, Default)]
pub struct WorkerStat {
    /// Id of the worker.
    pub worker_id: usize,

    /// The number of steps for interaction between the model and the environment.
    pub env_steps: usize,

    /// The number of reported episodes.
    pub episodes: usize,

    /// The number of episodes reaching the length limit.
    pub truncated_episodes: usize,

    /// The number of synchronizations with the shared model.
    pub sync_calls: usize,

    /// Duration of the interaction loop.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`WorkerStat`] for reporting.
pub fn worker_stats_fmt(stats: &[WorkerStat]) -> String {
    let mut s =
        "worker id, env steps, episodes, truncated, syncs, duration [sec], steps per sec\n"
            .to_string();
    for stat in stats.iter() {
        let d = stat.duration.as_secs_f32();
        let p = (stat.env_steps as f32) / d;
        s += format!(
            "{}, {}, {}, {}, {}, {}, {}\n",
            stat.worker_id,
            stat.env_steps,
            stat.episodes,
            stat.truncated_episodes,
            stat.sync_calls,
            d,
            p
        )
        .as_str();
    }
    s
}
