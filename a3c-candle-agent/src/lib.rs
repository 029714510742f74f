//! Policy-value model and shared optimizers for A3C, implemented with
//! [candle](https://crates.io/crates/candle-core).
pub mod actor_critic;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Creates the corresponding [`candle_core::Device`].
    pub fn to_candle(self) -> anyhow::Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}
