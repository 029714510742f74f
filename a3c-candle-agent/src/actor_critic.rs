//! Actor-critic model with separate policy and value networks.
mod base;
mod config;
pub use base::ActorCritic;
pub use config::ActorCriticConfig;
