//! Per-worker buffer of on-policy experience.

/// Sequence of `(observation, action, reward)` collected by one worker since its last
/// synchronization.
///
/// The three sequences always have the same length.
#[derive(Clone, Debug)]
pub struct Trajectory<O> {
    obs: Vec<O>,
    act: Vec<usize>,
    reward: Vec<f32>,
}

impl<O> Default for Trajectory<O> {
    fn default() -> Self {
        Self {
            obs: Vec::new(),
            act: Vec::new(),
            reward: Vec::new(),
        }
    }
}

impl<O> Trajectory<O> {
    /// Creates an empty trajectory with room for `capacity` steps.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            obs: Vec::with_capacity(capacity),
            act: Vec::with_capacity(capacity),
            reward: Vec::with_capacity(capacity),
        }
    }

    /// Appends a step.
    pub fn push(&mut self, obs: O, act: usize, reward: f32) {
        self.obs.push(obs);
        self.act.push(act);
        self.reward.push(reward);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if no step is stored.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Observations, oldest first.
    pub fn obs(&self) -> &[O] {
        &self.obs
    }

    /// Actions, oldest first.
    pub fn act(&self) -> &[usize] {
        &self.act
    }

    /// Rewards, oldest first.
    pub fn reward(&self) -> &[f32] {
        &self.reward
    }

    /// Discards all steps, keeping the allocation.
    pub fn clear(&mut self) {
        self.obs.clear();
        self.act.clear();
        self.reward.clear();
    }
}
