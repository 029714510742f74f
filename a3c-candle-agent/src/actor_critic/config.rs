use crate::{
    util::{InDim, OutDim},
    Device,
};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`ActorCritic`](super::ActorCritic).
///
/// The output dimension of the policy network is the number of actions. The value network
/// must have a single output.
pub struct ActorCriticConfig<P, V>
where
    P: OutDim,
    V: OutDim,
{
    pub(super) pi_config: Option<P>,
    pub(super) v_config: Option<V>,

    #[serde(default)]
    pub(super) device: Device,
}

impl<P, V> Default for ActorCriticConfig<P, V>
where
    P: OutDim,
    V: OutDim,
{
    fn default() -> Self {
        Self {
            pi_config: None,
            v_config: None,
            device: Device::default(),
        }
    }
}

impl<P, V> ActorCriticConfig<P, V>
where
    P: DeserializeOwned + Serialize + OutDim + InDim,
    V: DeserializeOwned + Serialize + OutDim + InDim,
{
    /// Sets configuration of the policy network.
    pub fn pi_config(mut self, v: P) -> Self {
        self.pi_config = Some(v);
        self
    }

    /// Sets configuration of the value network.
    pub fn v_config(mut self, v: V) -> Self {
        self.v_config = Some(v);
        self
    }

    /// Sets the number of actions, i.e., the output dimension of the policy network.
    pub fn n_actions(mut self, v: usize) -> Self {
        if let Some(pi_config) = &mut self.pi_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`ActorCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorCriticConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::MlpConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_actor_critic_config() -> Result<()> {
        let config = ActorCriticConfig::default()
            .pi_config(MlpConfig::new(4, vec![800], 0))
            .v_config(MlpConfig::new(4, vec![600], 1))
            .n_actions(2);

        let dir = TempDir::new("actor_critic_config")?;
        let path = dir.path().join("actor_critic_config.yaml");
        config.save(&path)?;
        let config_ = ActorCriticConfig::<MlpConfig, MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.pi_config.unwrap().get_out_dim(), 2);
        Ok(())
    }
}
