use crate::util::{InDim, OutDim};
use serde::{Deserialize, Serialize};

/// Activation function applied after each hidden layer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum Activation {
    /// `max(0, x)`.
    ReLU,

    /// `min(max(0, x), 6)`.
    ReLU6,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU6
    }
}

fn default_init_std() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,

    #[serde(default)]
    pub(super) activation: Activation,

    /// Standard deviation of the normal distribution for weights. Biases start at zero.
    #[serde(default = "default_init_std")]
    pub(super) init_std: f64,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// `units` are the sizes of the hidden layers. No activation is applied to the output.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation: Activation::default(),
            init_std: default_init_std(),
        }
    }

    /// Sets the activation function of hidden layers.
    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    /// Sets the standard deviation of initial weights.
    pub fn init_std(mut self, v: f64) -> Self {
        self.init_std = v;
        self
    }
}

impl InDim for MlpConfig {
    fn get_in_dim(&self) -> usize {
        self.in_dim
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}
