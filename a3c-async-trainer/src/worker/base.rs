use super::{WorkerConfig, WorkerStat};
use crate::{EpisodeDiagnostics, ParameterServer, ResultRecord, SharedCounters, WorkerMessage};
use a3c_core::{error::A3cError, Env, LossInfo, PolicyValueModel, SharedOptimizer, Trajectory};
use anyhow::Result;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// Maps an action outside of `0..n_actions` to action 0.
pub fn valid_action(act: usize, n_actions: usize) -> usize {
    if act < n_actions {
        act
    } else {
        0
    }
}

/// Runs episodes with a private environment and a private copy of the shared model.
///
/// Every `update_global_delay` steps, and at the end of an episode, the collected trajectory
/// is pushed to the [`ParameterServer`], which refreshes the private model. Completed episodes
/// are counted in [`SharedCounters`] and reported through the results channel. The worker
/// stops when the global episode counter reaches `max_episodes` and then sends
/// [`WorkerMessage::Shutdown`]. When the environment or the model fails, the error is
/// returned and no shutdown message is sent.
pub struct Worker<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    id: usize,
    config: WorkerConfig,
    env_config: E::Config,
    model_config: M::Config,
    seed: u64,
    server: Arc<ParameterServer<E, M, O>>,
    counters: Arc<SharedCounters>,
    sender: Sender<WorkerMessage>,
}

impl<E, M, O> Worker<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    /// Creates a worker.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: usize,
        config: WorkerConfig,
        env_config: E::Config,
        model_config: M::Config,
        seed: u64,
        server: Arc<ParameterServer<E, M, O>>,
        counters: Arc<SharedCounters>,
        sender: Sender<WorkerMessage>,
    ) -> Self {
        Self {
            id,
            config,
            env_config,
            model_config,
            seed,
            server,
            counters,
            sender,
        }
    }

    fn sync(
        &self,
        local: &mut M,
        terminal: bool,
        next_obs: &E::Obs,
        traj: &mut Trajectory<E::Obs>,
        stat: &mut WorkerStat,
    ) -> Result<LossInfo> {
        let loss = self.server.sync(local, terminal, next_obs, traj)?;
        traj.clear();
        stat.sync_calls += 1;
        Ok(loss)
    }

    /// Runs the interaction loop until the global episode counter reaches the budget.
    ///
    /// Environments are constructed while holding `guard_init_env`.
    pub fn run(self, guard_init_env: Arc<Mutex<bool>>) -> Result<WorkerStat> {
        let time = Instant::now();
        let mut env = {
            let _guard = guard_init_env
                .lock()
                .map_err(|_| A3cError::LockPoisoned("environment initialization"))?;
            E::build(&self.env_config, self.seed as i64)?
        };
        let mut local = M::build(&self.model_config, self.seed)?;
        self.server.pull(&mut local)?;

        let n_actions = env.n_actions();
        let delay = self.config.update_global_delay;
        let render = self.config.render && self.id == 0;
        let mut stat = WorkerStat {
            worker_id: self.id,
            ..WorkerStat::default()
        };
        let mut traj = Trajectory::with_capacity(delay);
        let mut thread_step = 1usize;
        info!("Starts worker {}", self.id);

        while self.counters.episodes()? < self.config.max_episodes {
            let mut obs = env.reset()?;
            let mut episode_reward = 0f32;
            let mut episode_step = 0;
            let mut losses = vec![];
            let mut done = false;

            while episode_step < self.config.max_length {
                if render {
                    env.render()?;
                }

                let act = local.sample_action(&obs)?;
                let step = env.step(valid_action(act, n_actions))?;
                done = step.is_done;
                let reward = match (done, self.config.terminal_reward) {
                    (true, Some(r)) => r,
                    _ => step.reward,
                };
                episode_reward += reward;
                traj.push(obs, act, reward);
                stat.env_steps += 1;

                if thread_step % delay == 0 || done {
                    let loss = self.sync(&mut local, done, &step.obs, &mut traj, &mut stat)?;
                    losses.push(loss);
                }

                obs = step.obs;
                thread_step += 1;
                episode_step += 1;
                if done {
                    break;
                }
            }

            if !done {
                if !traj.is_empty() {
                    let loss = self.sync(&mut local, false, &obs, &mut traj, &mut stat)?;
                    losses.push(loss);
                }
                stat.truncated_episodes += 1;
                if !self.config.count_truncated {
                    debug!(
                        "Worker {} reached the length limit, reward {}",
                        self.id, episode_reward
                    );
                    continue;
                }
            }

            let (episode, running_reward) = self.counters.complete_episode(episode_reward)?;
            stat.episodes += 1;
            debug!(
                "Worker {} finished episode {}, reward {}, length {}",
                self.id, episode, episode_reward, episode_step
            );

            let record = ResultRecord {
                worker_id: self.id,
                episode,
                reward: episode_reward,
                running_reward,
                episode_length: episode_step,
                diagnostics: EpisodeDiagnostics::from_losses(&losses),
            };
            if self.sender.send(WorkerMessage::Result(record)).is_err() {
                warn!("Worker {}: results channel is closed", self.id);
                break;
            }
        }

        stat.duration = time.elapsed();
        if self
            .sender
            .send(WorkerMessage::Shutdown { worker_id: self.id })
            .is_err()
        {
            warn!("Worker {}: results channel is closed", self.id);
        }
        info!("Stopped worker {}", self.id);

        Ok(stat)
    }
}
