use super::{CoordinatorConfig, CoordinatorStat};
use crate::{
    valid_action, worker_stats_fmt, CheckpointKind, CheckpointMeta, Checkpointer,
    ParameterServer, SharedCounters, Worker, WorkerConfig, WorkerMessage,
};
use a3c_core::{
    error::A3cError,
    record::{Record, Recorder},
    Env, EnvFactory, PolicyValueModel, SharedOptimizer,
};
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use log::{debug, error, info, warn};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

/// Progress of draining the results channel.
struct Drain {
    /// Workers that neither sent a shutdown message nor were found dead.
    alive: Vec<bool>,
    n_shutdown: usize,
    n_episodes: usize,
    interval_rewards: Vec<f32>,
}

impl Drain {
    fn new(n_workers: usize) -> Self {
        Self {
            alive: vec![true; n_workers],
            n_shutdown: 0,
            n_episodes: 0,
            interval_rewards: vec![],
        }
    }
}

/// Owns the shared model, the shared optimizer and the global counters, and runs workers.
///
/// [`Coordinator::build`] validates the configuration, the environments and the model
/// before any worker starts, and restores a checkpoint if one exists.
/// [`Coordinator::train`] spawns one thread per worker and drains the results channel until
/// every worker has sent [`WorkerMessage::Shutdown`] or has been found dead.
pub struct Coordinator<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    config: CoordinatorConfig,
    env_factory: EnvFactory<E::Config>,
    model_config: M::Config,
    env_name: String,
    server: Arc<ParameterServer<E, M, O>>,
    counters: Arc<SharedCounters>,
    checkpointer: Option<Checkpointer>,
    best_reward: Option<f32>,
}

impl<E, M, O> Coordinator<E, M, O>
where
    E: Env,
    M: PolicyValueModel<E>,
    O: SharedOptimizer<M, Grads = M::Grads>,
{
    /// Builds environments for every configuration, checks they agree on observation shape
    /// and number of actions, and returns the name and an initial observation of the first.
    fn probe_envs(env_factory: &EnvFactory<E::Config>, seed: i64) -> Result<(String, usize, E::Obs)> {
        let mut probe: Option<(String, Vec<usize>, usize, E::Obs)> = None;

        for env_config in env_factory.configs() {
            let mut env = E::build(env_config, seed)?;
            let (obs_shape, n_actions) = (env.obs_shape(), env.n_actions());
            match &probe {
                None => {
                    let obs = env.reset()?;
                    probe = Some((env.name(), obs_shape, n_actions, obs));
                }
                Some((name, shape, n, _)) => {
                    if *shape != obs_shape || *n != n_actions {
                        return Err(A3cError::Config(format!(
                            "{} has observation shape {:?} and {} actions, but {} has {:?} and {}",
                            env.name(),
                            obs_shape,
                            n_actions,
                            name,
                            shape,
                            n
                        ))
                        .into());
                    }
                }
            }
        }

        match probe {
            Some((name, _, n_actions, obs)) => Ok((name, n_actions, obs)),
            None => Err(A3cError::Config("no environment configuration is given".into()).into()),
        }
    }

    /// Builds the shared model and optimizer, and loads a checkpoint unless `skip_load`.
    pub fn build(
        config: &CoordinatorConfig,
        env_factory: EnvFactory<E::Config>,
        model_config: &M::Config,
        opt_config: &O::Config,
    ) -> Result<Self> {
        config.validate()?;
        env_factory.validate()?;

        let (env_name, n_actions, obs) = Self::probe_envs(&env_factory, config.seed as i64)?;
        let model = M::build(model_config, config.seed)?;
        if model.n_actions() < n_actions {
            return Err(A3cError::Config(format!(
                "the model has {} actions, but {} has {}",
                model.n_actions(),
                env_name,
                n_actions
            ))
            .into());
        }
        model
            .value(&obs)
            .with_context(|| format!("the model does not accept observations of {}", env_name))?;

        let opt = O::build(opt_config, &model)?;
        let server = Arc::new(ParameterServer::new(model, opt, config.gamma));
        let checkpointer = config
            .model_dir
            .as_ref()
            .map(|dir| Checkpointer::new(dir, &env_name));

        let (episodes, best_reward) = match (&checkpointer, config.skip_load) {
            (Some(checkpointer), false) => {
                let kind = match config.play {
                    true => CheckpointKind::Best,
                    false => CheckpointKind::Latest,
                };
                match checkpointer.load(kind, &server)? {
                    Some(meta) => (meta.episode, meta.best_reward),
                    None => {
                        info!("No checkpoint in {:?}", checkpointer.path(kind));
                        (0, None)
                    }
                }
            }
            _ => (0, None),
        };

        Ok(Self {
            config: config.clone(),
            env_factory,
            model_config: model_config.clone(),
            env_name,
            server,
            counters: Arc::new(SharedCounters::new(episodes, config.running_reward)),
            checkpointer,
            best_reward,
        })
    }

    /// The parameter server holding the shared model.
    pub fn server(&self) -> &Arc<ParameterServer<E, M, O>> {
        &self.server
    }

    /// The global counters.
    pub fn counters(&self) -> &Arc<SharedCounters> {
        &self.counters
    }

    /// Best mean reward over a checkpoint interval.
    pub fn best_reward(&self) -> Option<f32> {
        self.best_reward
    }

    /// Name of the environment.
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    fn save(&self, kind: CheckpointKind) -> Result<()> {
        if let Some(checkpointer) = &self.checkpointer {
            let meta = CheckpointMeta::new(self.counters.episodes()?, self.best_reward);
            if let Err(e) = checkpointer.save(kind, &self.server, &meta) {
                warn!("Failed to save checkpoint: {:?}", e);
            }
        }
        Ok(())
    }

    /// Updates the best reward with the mean reward of the interval and saves checkpoints.
    fn checkpoint(&mut self, interval_rewards: &mut Vec<f32>) -> Result<()> {
        if !interval_rewards.is_empty() {
            let mean = interval_rewards.iter().sum::<f32>() / interval_rewards.len() as f32;
            interval_rewards.clear();
            if self.best_reward.map_or(true, |best| mean > best) {
                info!("Best mean reward {}", mean);
                self.best_reward = Some(mean);
                self.save(CheckpointKind::Best)?;
            }
        }
        self.save(CheckpointKind::Latest)
    }

    fn handle_message<R: Recorder>(
        &mut self,
        msg: WorkerMessage,
        drain: &mut Drain,
        recorder: &mut R,
    ) -> Result<()> {
        match msg {
            WorkerMessage::Result(r) => {
                debug!("{:?}", r);
                drain.n_episodes += 1;
                drain.interval_rewards.push(r.reward);
                recorder.write(Record::from(&r));

                if drain.n_episodes % self.config.checkpoint_interval == 0 {
                    info!(
                        "Episode {}, reward {}, running reward {}",
                        r.episode, r.reward, r.running_reward
                    );
                    self.checkpoint(&mut drain.interval_rewards)?;
                }
            }
            WorkerMessage::Shutdown { worker_id } => {
                if let Some(alive) = drain.alive.get_mut(worker_id) {
                    if *alive {
                        *alive = false;
                        drain.n_shutdown += 1;
                    }
                }
                info!("Worker {} finished", worker_id);
            }
        }
        Ok(())
    }

    /// Runs episodes with a copy of the shared model without updating it.
    ///
    /// Uses the first environment configuration and returns the sum of rewards reported by
    /// the environment in each episode.
    pub fn evaluate(&self, n_episodes: usize) -> Result<Vec<f32>> {
        let env_config = self
            .env_factory
            .configs()
            .into_iter()
            .next()
            .ok_or_else(|| A3cError::Config("no environment configuration is given".into()))?;
        let mut env = E::build(env_config, self.config.seed as i64)?;
        let mut model = M::build(&self.model_config, self.config.seed)?;
        self.server.pull(&mut model)?;
        let n_actions = env.n_actions();

        (0..n_episodes)
            .map(|_| {
                let mut obs = env.reset()?;
                let mut reward = 0f32;
                for _ in 0..self.config.max_length {
                    if self.config.render {
                        env.render()?;
                    }
                    let act = valid_action(model.sample_action(&obs)?, n_actions);
                    let step = env.step(act)?;
                    reward += step.reward;
                    if step.is_done {
                        break;
                    }
                    obs = step.obs;
                }
                Ok(reward)
            })
            .collect()
    }
}

impl<E, M, O> Coordinator<E, M, O>
where
    E: Env + 'static,
    E::Config: Send + 'static,
    M: PolicyValueModel<E> + 'static,
    M::Config: 'static,
    O: SharedOptimizer<M, Grads = M::Grads> + 'static,
{
    /// Runs workers until the global episode counter reaches `max_episodes`.
    ///
    /// Every episode result is written to `recorder`. Returns
    /// [`A3cError::WorkerCrashed`] if a worker ended without a shutdown message.
    pub fn train<R: Recorder>(&mut self, recorder: &mut R) -> Result<CoordinatorStat> {
        let time = Instant::now();
        let n = self.config.n_workers;
        let (sender, receiver) = unbounded();
        let guard_init_env = Arc::new(Mutex::new(true));
        let rng = fastrand::Rng::with_seed(self.config.seed);
        let worker_config = WorkerConfig::from(&self.config);

        let mut handles = Vec::with_capacity(n);
        for id in 0..n {
            let worker = Worker::<E, M, O>::build(
                id,
                worker_config.clone(),
                self.env_factory.pick(&rng)?.clone(),
                self.model_config.clone(),
                self.config.seed + id as u64,
                self.server.clone(),
                self.counters.clone(),
                sender.clone(),
            );
            let guard = guard_init_env.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker.run(guard))?;
            handles.push(handle);
        }
        drop(sender);
        info!("Started {} workers", n);

        let timeout = Duration::from_millis(self.config.liveness_check_interval_ms);
        let mut drain = Drain::new(n);
        let mut crashed = vec![];

        while drain.n_shutdown + crashed.len() < n {
            match receiver.recv_timeout(timeout) {
                Ok(msg) => self.handle_message(msg, &mut drain, recorder)?,
                Err(RecvTimeoutError::Timeout) => {
                    let finished = (0..n)
                        .filter(|&i| drain.alive[i] && handles[i].is_finished())
                        .collect::<Vec<_>>();
                    if finished.is_empty() {
                        continue;
                    }

                    // Messages sent before the threads finished
                    while let Ok(msg) = receiver.try_recv() {
                        self.handle_message(msg, &mut drain, recorder)?;
                    }
                    for i in finished {
                        if drain.alive[i] {
                            error!("Worker {} stopped without shutdown message", i);
                            drain.alive[i] = false;
                            crashed.push(i);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Results channel is disconnected");
                    break;
                }
            }
        }
        crashed.extend(
            drain
                .alive
                .iter()
                .enumerate()
                .filter(|(_, alive)| **alive)
                .map(|(i, _)| i),
        );

        let mut worker_stats = vec![];
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(stat)) => worker_stats.push(stat),
                Ok(Err(e)) => error!("Worker {} failed: {:?}", i, e),
                Err(_) => error!("Worker {} panicked", i),
            }
        }
        self.checkpoint(&mut drain.interval_rewards)?;
        recorder.flush();

        let stat = CoordinatorStat {
            episodes: drain.n_episodes,
            opt_steps: self.server.n_steps()?,
            best_reward: self.best_reward,
            duration: time.elapsed(),
            worker_stats,
        };
        info!("Stats of training\n{}", stat.fmt());
        info!("Stats of workers\n{}", worker_stats_fmt(&stat.worker_stats));

        if !crashed.is_empty() {
            crashed.sort_unstable();
            return Err(A3cError::WorkerCrashed(crashed).into());
        }
        Ok(stat)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{
        model_config, model_config_with, Model, ScriptedEnv, ScriptedEnvConfig,
    };
    use a3c_candle_agent::opt::{Optimizer, OptimizerConfig};
    use a3c_core::record::BufferedRecorder;
    use tempdir::TempDir;
    use test_log::test;

    type Coordinator_ = Coordinator<ScriptedEnv, Model, Optimizer>;

    fn config(n_workers: usize, max_episodes: usize) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .n_workers(n_workers)
            .max_episodes(max_episodes)
            .update_global_delay(2)
            .checkpoint_interval(2)
            .liveness_check_interval_ms(50)
    }

    fn build(config: &CoordinatorConfig, env_config: ScriptedEnvConfig) -> Result<Coordinator_> {
        let model_config = model_config(&env_config);
        Coordinator_::build(
            config,
            EnvFactory::Single(env_config),
            &model_config,
            &OptimizerConfig::default(),
        )
    }

    fn config_error(err: anyhow::Error) -> bool {
        matches!(err.downcast_ref::<A3cError>(), Some(A3cError::Config(_)))
    }

    #[test]
    fn test_train_terminates_after_all_shutdowns() -> Result<()> {
        const N: usize = 3;
        const MAX_EPISODES: usize = 12;
        let mut coordinator = build(&config(N, MAX_EPISODES), ScriptedEnvConfig::default())?;
        let mut recorder = BufferedRecorder::new();
        let stat = coordinator.train(&mut recorder)?;

        // every worker checks the counter before starting an episode
        assert!(stat.episodes >= MAX_EPISODES);
        assert!(stat.episodes <= MAX_EPISODES + N - 1);
        assert_eq!(stat.episodes, recorder.len());
        assert_eq!(
            stat.worker_stats.iter().map(|s| s.worker_id).collect::<Vec<_>>(),
            (0..N).collect::<Vec<_>>()
        );
        assert_eq!(coordinator.counters().episodes()?, stat.episodes);
        assert_eq!(
            stat.worker_stats.iter().map(|s| s.episodes).sum::<usize>(),
            stat.episodes
        );
        assert_eq!(
            stat.opt_steps,
            stat.worker_stats.iter().map(|s| s.sync_calls).sum::<usize>()
        );

        // every counter value is reported exactly once
        let mut episodes = recorder
            .iter()
            .map(|r| r.get_scalar("episode").unwrap() as usize)
            .collect::<Vec<_>>();
        episodes.sort_unstable();
        assert_eq!(episodes, (1..=stat.episodes).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_worker_crash_is_reported() -> Result<()> {
        let env_config = ScriptedEnvConfig {
            fail_after: Some(5),
            ..ScriptedEnvConfig::default()
        };
        let mut coordinator = build(&config(2, 100), env_config)?;
        let mut recorder = BufferedRecorder::new();
        let err = coordinator.train(&mut recorder).unwrap_err();

        match err.downcast_ref::<A3cError>() {
            Some(A3cError::WorkerCrashed(ids)) => assert_eq!(ids, &vec![0, 1]),
            _ => panic!("unexpected error {:?}", err),
        }
        // one completed episode per worker before failing
        assert_eq!(recorder.len(), 2);
        Ok(())
    }

    #[test]
    fn test_config_errors() -> Result<()> {
        let env_config = ScriptedEnvConfig::default();
        let model_config = model_config(&env_config);
        let opt_config = OptimizerConfig::default();

        let err = Coordinator_::build(
            &config(2, 10),
            EnvFactory::Choice(vec![]),
            &model_config,
            &opt_config,
        );
        assert!(config_error(err.err().unwrap()));

        let err = Coordinator_::build(
            &config(0, 10),
            EnvFactory::Single(env_config.clone()),
            &model_config,
            &opt_config,
        );
        assert!(config_error(err.err().unwrap()));

        // heterogeneous environments must agree on dimensions
        let other = ScriptedEnvConfig {
            n_actions: 3,
            name: "other".to_string(),
            ..ScriptedEnvConfig::default()
        };
        let err = Coordinator_::build(
            &config(2, 10),
            EnvFactory::Choice(vec![env_config.clone(), other]),
            &model_config,
            &opt_config,
        );
        assert!(config_error(err.err().unwrap()));

        // the action head is smaller than the action set
        let err = Coordinator_::build(
            &config(2, 10),
            EnvFactory::Single(env_config.clone()),
            &model_config_with(env_config.obs_dim, 1),
            &opt_config,
        );
        assert!(config_error(err.err().unwrap()));

        // the model does not accept the observations
        let err = Coordinator_::build(
            &config(2, 10),
            EnvFactory::Single(env_config.clone()),
            &model_config_with(env_config.obs_dim + 1, 2),
            &opt_config,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<A3cError>(),
            Some(A3cError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_checkpoint_and_resume() -> Result<()> {
        let dir = TempDir::new("coordinator")?;
        let model_dir = dir.path().to_str().unwrap().to_string();
        let config = config(1, 4).model_dir(model_dir.clone());

        let mut coordinator = build(&config, ScriptedEnvConfig::default())?;
        let stat = coordinator.train(&mut BufferedRecorder::new())?;
        assert_eq!(stat.episodes, 4);
        // constant episode reward
        assert_eq!(stat.best_reward, Some(9.0));
        assert!(dir.path().join("scripted/latest/meta.yaml").is_file());
        assert!(dir.path().join("scripted/best/model.safetensors").is_file());

        let resumed = build(&config, ScriptedEnvConfig::default())?;
        assert_eq!(resumed.counters().episodes()?, 4);
        assert_eq!(resumed.best_reward(), Some(9.0));
        assert_eq!(resumed.server().n_steps()?, stat.opt_steps);

        let fresh = build(&config.clone().skip_load(true), ScriptedEnvConfig::default())?;
        assert_eq!(fresh.counters().episodes()?, 0);
        assert_eq!(fresh.server().n_steps()?, 0);

        // the budget is already spent
        let mut resumed = resumed;
        let stat = resumed.train(&mut BufferedRecorder::new())?;
        assert_eq!(stat.episodes, 0);
        Ok(())
    }

    #[test]
    fn test_evaluate() -> Result<()> {
        let coordinator = build(&config(1, 1), ScriptedEnvConfig::default())?;
        let rewards = coordinator.evaluate(3)?;
        assert_eq!(rewards, vec![15.0; 3]);
        assert_eq!(coordinator.server().n_steps()?, 0);
        Ok(())
    }
}
