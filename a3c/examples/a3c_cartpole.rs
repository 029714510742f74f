use a3c::cartpole::{CartPole, CartPoleConfig};
use a3c_async_trainer::{train_async, Coordinator, CoordinatorConfig};
use a3c_candle_agent::{
    actor_critic::{ActorCritic, ActorCriticConfig},
    mlp::{Mlp, MlpConfig},
    opt::{Optimizer, OptimizerConfig},
};
use a3c_core::EnvFactory;
use anyhow::Result;
use clap::Parser;
use log::info;

const DIM_OBS: usize = 4;
const DIM_ACT: usize = 2;
const N_UNITS: usize = 128;
const LR: f64 = 1e-4;
const MAX_STEPS: usize = 500;
const N_EPISODES_PER_EVAL: usize = 5;
const MODEL_DIR: &str = "./a3c/examples/model/a3c_cartpole";

type Model = ActorCritic<Mlp, Mlp>;

mod config {
    use super::*;

    pub fn create_env_config(render: bool) -> CartPoleConfig {
        CartPoleConfig::default().max_steps(MAX_STEPS).render(render)
    }

    pub fn create_model_config() -> ActorCriticConfig<MlpConfig, MlpConfig> {
        ActorCriticConfig::default()
            .pi_config(MlpConfig::new(DIM_OBS, vec![N_UNITS], DIM_ACT))
            .v_config(MlpConfig::new(DIM_OBS, vec![N_UNITS], 1))
    }

    pub fn create_opt_config() -> OptimizerConfig {
        OptimizerConfig::AdamW {
            lr: LR,
            beta1: 0.92,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }

    pub fn create_coordinator_config(args: &Args) -> Result<CoordinatorConfig> {
        let mut config = match &args.config {
            Some(path) => CoordinatorConfig::load(path)?,
            None => CoordinatorConfig::default(),
        };
        if let Some(v) = args.n_workers {
            config = config.n_workers(v);
        }
        if let Some(v) = args.gamma {
            config = config.gamma(v);
        }
        if let Some(v) = args.update_global_delay {
            config = config.update_global_delay(v);
        }
        if let Some(v) = args.checkpoint_interval {
            config = config.checkpoint_interval(v);
        }
        if let Some(v) = args.max_episodes {
            config = config.max_episodes(v);
        }
        if let Some(v) = args.max_length {
            config = config.max_length(v);
        }
        Ok(config
            .render(args.render)
            .skip_load(args.skip_load)
            .play(args.play)
            .model_dir(args.model_dir.clone()))
    }
}

use config::{create_coordinator_config, create_env_config, create_model_config, create_opt_config};

/// Train/play A3C agent in cartpole environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file of the coordinator configuration, overridden by the options below
    #[arg(long)]
    config: Option<String>,

    /// The number of workers [default: available parallelism]
    #[arg(long)]
    n_workers: Option<usize>,

    /// Discount factor [default: 0.9]
    #[arg(long)]
    gamma: Option<f32>,

    /// Interval of synchronization in steps of each worker [default: 20]
    #[arg(long)]
    update_global_delay: Option<usize>,

    /// Interval of checkpointing in episodes [default: 10]
    #[arg(long)]
    checkpoint_interval: Option<usize>,

    /// The number of episodes to be completed [default: 10000]
    #[arg(long)]
    max_episodes: Option<usize>,

    /// The maximum number of steps in an episode [default: 1000]
    #[arg(long)]
    max_length: Option<usize>,

    /// Render the environment of worker 0
    #[arg(long, default_value_t = false)]
    render: bool,

    /// Start from scratch even if a checkpoint exists
    #[arg(long, default_value_t = false)]
    skip_load: bool,

    /// Load the best checkpoint and play episodes without training
    #[arg(long, default_value_t = false)]
    play: bool,

    /// Directory of checkpoints and tensorboard logs
    #[arg(long, default_value_t = MODEL_DIR.to_string())]
    model_dir: String,
}

fn train(args: &Args) -> Result<()> {
    let config = create_coordinator_config(args)?;
    let stat = train_async::<CartPole, Model, Optimizer, _>(
        &args.model_dir,
        &config,
        EnvFactory::Single(create_env_config(args.render)),
        &create_model_config(),
        &create_opt_config(),
    )?;
    info!(
        "Trained {} episodes, best mean reward {:?}",
        stat.episodes, stat.best_reward
    );
    Ok(())
}

fn play(args: &Args, n_episodes: usize) -> Result<Vec<f32>> {
    let config = create_coordinator_config(args)?.play(true);
    let coordinator = Coordinator::<CartPole, Model, Optimizer>::build(
        &config,
        EnvFactory::Single(create_env_config(args.render)),
        &create_model_config(),
        &create_opt_config(),
    )?;
    let rewards = coordinator.evaluate(n_episodes)?;
    for (i, r) in rewards.iter().enumerate() {
        info!("Episode {}, reward {}", i, r);
    }
    Ok(rewards)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.play {
        play(&args, N_EPISODES_PER_EVAL)?;
    } else {
        train(&args)?;
    }

    Ok(())
}
