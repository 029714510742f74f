//! Source of environment configurations for workers.
use crate::error::A3cError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configurations from which workers build their private environments.
///
/// With [`EnvFactory::Choice`], every worker draws one of the configurations uniformly at
/// random, which allows training on heterogeneous environments sharing the same
/// observation and action spaces.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum EnvFactory<C> {
    /// All workers use the same configuration.
    Single(C),

    /// Each worker draws one configuration.
    Choice(Vec<C>),
}

impl<C> EnvFactory<C> {
    /// Checks that at least one configuration is available.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Choice(configs) if configs.is_empty() => Err(A3cError::Config(
                "no environment configuration is given".to_string(),
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// Returns all of the configurations.
    pub fn configs(&self) -> Vec<&C> {
        match self {
            Self::Single(config) => vec![config],
            Self::Choice(configs) => configs.iter().collect(),
        }
    }

    /// Draws a configuration for a worker.
    pub fn pick(&self, rng: &fastrand::Rng) -> Result<&C> {
        self.validate()?;
        match self {
            Self::Single(config) => Ok(config),
            Self::Choice(configs) => Ok(&configs[rng.usize(..configs.len())]),
        }
    }
}

impl<C> From<C> for EnvFactory<C> {
    fn from(config: C) -> Self {
        Self::Single(config)
    }
}
