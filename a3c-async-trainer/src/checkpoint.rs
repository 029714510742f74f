//! Persistence of the shared model and optimizer.
use crate::ParameterServer;
use a3c_core::{Env, PolicyValueModel, SharedOptimizer};
use anyhow::Result;
use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

const MODEL_FILE: &str = "model.safetensors";
const OPTIMIZER_FILE: &str = "optimizer.safetensors";
const META_FILE: &str = "meta.yaml";

/// Which checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointKind {
    /// The most recently saved state.
    Latest,

    /// The state with the best mean reward over a checkpoint interval.
    Best,
}

impl CheckpointKind {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Best => "best",
        }
    }
}

/// Bookkeeping stored with a checkpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CheckpointMeta {
    /// Value of the global episode counter.
    pub episode: usize,

    /// Best mean reward over a checkpoint interval so far.
    pub best_reward: Option<f32>,

    /// Local time of saving, RFC 3339.
    pub saved_at: String,
}

impl CheckpointMeta {
    /// Creates bookkeeping stamped with the current time.
    pub fn new(episode: usize, best_reward: Option<f32>) -> Self {
        Self {
            episode,
            best_reward,
            saved_at: Local::now().to_rfc3339(),
        }
    }
}

/// Saves and loads checkpoints in `<model_dir>/<env_name>/{latest,best}`.
///
/// Each checkpoint directory contains `model.safetensors`, `optimizer.safetensors` and
/// `meta.yaml`.
#[derive(Clone, Debug)]
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    /// Creates a checkpointer for environment `env_name`.
    pub fn new(model_dir: impl AsRef<Path>, env_name: &str) -> Self {
        Self {
            dir: model_dir.as_ref().join(env_name),
        }
    }

    /// Directory of a checkpoint.
    pub fn path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(kind.dir_name())
    }

    /// Directory where a checkpoint is written before being moved to [`Checkpointer::path`].
    fn staging_path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(format!(".{}.tmp", kind.dir_name()))
    }

    /// Returns `true` if the checkpoint was saved.
    pub fn exists(&self, kind: CheckpointKind) -> bool {
        self.path(kind).join(META_FILE).is_file()
    }

    /// Saves the shared model and optimizer.
    ///
    /// Files are written to a staging directory that replaces the checkpoint only after all
    /// of them are complete, so an interrupted save leaves the previous checkpoint intact.
    pub fn save<E, M, O>(
        &self,
        kind: CheckpointKind,
        server: &ParameterServer<E, M, O>,
        meta: &CheckpointMeta,
    ) -> Result<()>
    where
        E: Env,
        M: PolicyValueModel<E>,
        O: SharedOptimizer<M, Grads = M::Grads>,
    {
        let staging = self.staging_path(kind);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        server.with_shared(|model, opt| {
            model.save_params(&staging.join(MODEL_FILE))?;
            opt.save(&staging.join(OPTIMIZER_FILE))
        })?;
        let mut file = File::create(staging.join(META_FILE))?;
        file.write_all(serde_yaml::to_string(meta)?.as_bytes())?;
        file.sync_all()?;

        let path = self.path(kind);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::rename(&staging, &path)?;
        info!("Saved {} checkpoint at episode {} in {:?}", kind.dir_name(), meta.episode, path);
        Ok(())
    }

    /// Loads the shared model and optimizer.
    ///
    /// Returns `None` without touching `server` if the checkpoint does not exist.
    pub fn load<E, M, O>(
        &self,
        kind: CheckpointKind,
        server: &ParameterServer<E, M, O>,
    ) -> Result<Option<CheckpointMeta>>
    where
        E: Env,
        M: PolicyValueModel<E>,
        O: SharedOptimizer<M, Grads = M::Grads>,
    {
        if !self.exists(kind) {
            return Ok(None);
        }

        let path = self.path(kind);
        let meta: CheckpointMeta =
            serde_yaml::from_reader(BufReader::new(File::open(path.join(META_FILE))?))?;
        server.with_shared(|model, opt| {
            model.load_params(&path.join(MODEL_FILE))?;
            opt.load(&path.join(OPTIMIZER_FILE))
        })?;
        info!("Loaded {} checkpoint at episode {} from {:?}", kind.dir_name(), meta.episode, path);
        Ok(Some(meta))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{model_config, Model, ScriptedEnv, ScriptedEnvConfig, VecObs};
    use a3c_candle_agent::opt::{Optimizer, OptimizerConfig};
    use a3c_core::Trajectory;
    use tempdir::TempDir;

    type Server = ParameterServer<ScriptedEnv, Model, Optimizer>;

    fn value(server: &Server) -> Result<f32> {
        server.with_shared(|m, _| {
            PolicyValueModel::<ScriptedEnv>::value(m, &VecObs::filled(0.3))
        })
    }

    #[test]
    fn test_checkpoint_round_trip() -> Result<()> {
        let env_config = ScriptedEnvConfig::default();
        let opt_config = OptimizerConfig::default();
        let server = Server::build(&model_config(&env_config), &opt_config, 0.9, 0)?;

        let mut local = Model::build(&model_config(&env_config), 1)?;
        let mut traj = Trajectory::default();
        traj.push(VecObs::filled(0.1), 1, 1.0);
        server.sync(&mut local, true, &VecObs::filled(0.2), &traj)?;

        let dir = TempDir::new("checkpoint")?;
        let checkpointer = Checkpointer::new(dir.path(), "scripted");
        assert!(checkpointer.load(CheckpointKind::Latest, &server)?.is_none());

        let meta = CheckpointMeta::new(7, Some(2.5));
        checkpointer.save(CheckpointKind::Latest, &server, &meta)?;
        assert!(checkpointer.exists(CheckpointKind::Latest));
        assert!(!checkpointer.exists(CheckpointKind::Best));
        assert!(dir.path().join("scripted/latest/model.safetensors").is_file());

        let restored = Server::build(&model_config(&env_config), &opt_config, 0.9, 5)?;
        assert_ne!(value(&server)?, value(&restored)?);
        let meta_ = checkpointer.load(CheckpointKind::Latest, &restored)?;
        assert_eq!(meta_, Some(meta));
        assert_eq!(value(&server)?, value(&restored)?);
        assert_eq!(restored.n_steps()?, 1);
        Ok(())
    }

    #[test]
    fn test_interrupted_save_keeps_previous_checkpoint() -> Result<()> {
        let env_config = ScriptedEnvConfig::default();
        let server = Server::build(&model_config(&env_config), &OptimizerConfig::default(), 0.9, 0)?;
        let dir = TempDir::new("checkpoint")?;
        let checkpointer = Checkpointer::new(dir.path(), "scripted");
        checkpointer.save(CheckpointKind::Latest, &server, &CheckpointMeta::new(3, None))?;

        // a save that died after writing the model only
        let staging = dir.path().join("scripted/.latest.tmp");
        fs::create_dir_all(&staging)?;
        fs::write(staging.join(MODEL_FILE), b"truncated")?;

        let restored = Server::build(&model_config(&env_config), &OptimizerConfig::default(), 0.9, 5)?;
        let meta = checkpointer.load(CheckpointKind::Latest, &restored)?;
        assert_eq!(meta.map(|m| m.episode), Some(3));
        assert_eq!(value(&server)?, value(&restored)?);

        // the next save replaces the leftovers
        checkpointer.save(CheckpointKind::Latest, &server, &CheckpointMeta::new(5, None))?;
        assert!(!staging.exists());
        let meta = checkpointer.load(CheckpointKind::Latest, &restored)?;
        assert_eq!(meta.map(|m| m.episode), Some(5));
        Ok(())
    }
}
