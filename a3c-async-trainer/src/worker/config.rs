use crate::CoordinatorConfig;

/// Configuration of [`Worker`](crate::Worker), derived from [`CoordinatorConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    /// Interval of synchronization in environment steps.
    pub update_global_delay: usize,

    /// Workers stop once the global episode counter reaches this value.
    pub max_episodes: usize,

    /// The maximum number of steps in an episode.
    pub max_length: usize,

    /// Reward recorded on terminal transitions in place of the environment's reward.
    pub terminal_reward: Option<f32>,

    /// If `true`, episodes reaching `max_length` are counted and reported.
    pub count_truncated: bool,

    /// If `true`, the worker of id 0 renders the environment.
    pub render: bool,
}

impl From<&CoordinatorConfig> for WorkerConfig {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            update_global_delay: config.update_global_delay,
            max_episodes: config.max_episodes,
            max_length: config.max_length,
            terminal_reward: config.terminal_reward,
            count_truncated: config.count_truncated,
            render: config.render,
        }
    }
}
