//! Cart-pole balancing task.
//!
//! A pole is attached by an unactuated joint to a cart moving along a frictionless track.
//! Action 0 pushes the cart to the left and action 1 to the right. A reward of 1 is given for
//! every step, and the episode ends when the pole tilts more than 12 degrees, the cart leaves
//! the track or `max_steps` steps were taken.
use a3c_core::{Env, Obs, Step};
use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

const GRAVITY: f32 = 9.8;
const MASS_CART: f32 = 1.0;
const MASS_POLE: f32 = 0.1;
const TOTAL_MASS: f32 = MASS_CART + MASS_POLE;
const HALF_LENGTH: f32 = 0.5;
const POLE_MASS_LENGTH: f32 = MASS_POLE * HALF_LENGTH;
const FORCE_MAG: f32 = 10.0;
const TAU: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * 2.0 * PI / 360.0;
const TRACK_WIDTH: usize = 41;

/// Cart position, cart velocity, pole angle and pole angular velocity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CartPoleObs(pub [f32; 4]);

impl Obs for CartPoleObs {
    fn shape(&self) -> Vec<usize> {
        vec![4]
    }
}

impl From<CartPoleObs> for Tensor {
    fn from(obs: CartPoleObs) -> Tensor {
        Tensor::new(&obs.0, &Device::Cpu).expect("Failed to convert CartPoleObs to Tensor")
    }
}

/// Configuration of [`CartPole`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CartPoleConfig {
    /// Episodes are terminated after this many steps.
    pub max_steps: usize,

    /// If `true`, [`Env::render`] prints the state to stdout.
    pub render: bool,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            max_steps: 500,
            render: false,
        }
    }
}

impl CartPoleConfig {
    /// Sets the maximum number of steps in an episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the render flag.
    pub fn render(mut self, v: bool) -> Self {
        self.render = v;
        self
    }
}

/// Cart-pole environment.
pub struct CartPole {
    config: CartPoleConfig,
    rng: fastrand::Rng,
    state: [f32; 4],
    t: usize,
    done: bool,
}

impl CartPole {
    /// Current state.
    pub fn state(&self) -> [f32; 4] {
        self.state
    }

    fn is_failed(&self) -> bool {
        let [x, _, theta, _] = self.state;
        x < -X_THRESHOLD || x > X_THRESHOLD || theta < -THETA_THRESHOLD || theta > THETA_THRESHOLD
    }
}

impl Env for CartPole {
    type Config = CartPoleConfig;
    type Obs = CartPoleObs;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            rng: fastrand::Rng::with_seed(seed as u64),
            state: [0.0; 4],
            t: 0,
            done: true,
        })
    }

    fn reset(&mut self) -> Result<CartPoleObs> {
        for s in self.state.iter_mut() {
            *s = self.rng.f32() * 0.1 - 0.05;
        }
        self.t = 0;
        self.done = false;
        Ok(CartPoleObs(self.state))
    }

    fn step(&mut self, act: usize) -> Result<Step<Self>> {
        if self.done {
            bail!("CartPole::step() called on a finished episode");
        }

        let [x, x_dot, theta, theta_dot] = self.state;
        let force = match act {
            0 => -FORCE_MAG,
            _ => FORCE_MAG,
        };
        let (sin, cos) = theta.sin_cos();
        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (HALF_LENGTH * (4.0 / 3.0 - MASS_POLE * cos * cos / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        // Euler integration
        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.t += 1;
        self.done = self.is_failed() || self.t >= self.config.max_steps;

        Ok(Step::new(CartPoleObs(self.state), 1.0, self.done, ()))
    }

    fn render(&mut self) -> Result<()> {
        if self.config.render {
            let x = (self.state[0] + X_THRESHOLD) / (2.0 * X_THRESHOLD);
            let pos = ((x * (TRACK_WIDTH - 1) as f32).round() as usize).min(TRACK_WIDTH - 1);
            let pole = match self.state[2] {
                th if th < -0.05 => '\\',
                th if th > 0.05 => '/',
                _ => '|',
            };
            let track = (0..TRACK_WIDTH)
                .map(|i| if i == pos { pole } else { '_' })
                .collect::<String>();
            println!("{} t={:4}", track, self.t);
        }
        Ok(())
    }

    fn obs_shape(&self) -> Vec<usize> {
        vec![4]
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn name(&self) -> String {
        "CartPole".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(env: &mut CartPole, policy: impl Fn(&[f32; 4]) -> usize) -> Result<usize> {
        let mut obs = env.reset()?;
        let mut t = 0;
        loop {
            let step = env.step(policy(&obs.0))?;
            t += 1;
            if step.is_done {
                return Ok(t);
            }
            obs = step.obs;
        }
    }

    #[test]
    fn test_reset_is_near_zero() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default(), 0)?;
        for _ in 0..10 {
            let obs = env.reset()?;
            assert!(obs.0.iter().all(|s| s.abs() <= 0.05));
        }
        Ok(())
    }

    #[test]
    fn test_constant_push_fails_early() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default(), 1)?;
        let len = run(&mut env, |_| 1)?;
        assert!(len < 100);
        assert!(env.is_failed());
        Ok(())
    }

    #[test]
    fn test_balancing_reaches_max_steps() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default().max_steps(20), 2)?;
        // push toward the side the pole is falling to
        let len = run(&mut env, |s| if s[2] + 0.5 * s[3] > 0.0 { 1 } else { 0 })?;
        assert_eq!(len, 20);
        Ok(())
    }

    #[test]
    fn test_step_after_done_fails() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default().max_steps(1), 3)?;
        assert!(env.step(0).is_err());
        env.reset()?;
        assert!(env.step(0)?.is_done);
        assert!(env.step(0).is_err());
        Ok(())
    }

    #[test]
    fn test_same_seed_same_episode() -> Result<()> {
        let mut env1 = CartPole::build(&CartPoleConfig::default(), 7)?;
        let mut env2 = CartPole::build(&CartPoleConfig::default(), 7)?;
        assert_eq!(env1.reset()?, env2.reset()?);
        for t in 0..5 {
            assert_eq!(env1.step(t % 2)?.obs, env2.step(t % 2)?.obs);
        }
        Ok(())
    }

    #[test]
    fn test_obs_to_tensor() -> Result<()> {
        let t: Tensor = CartPoleObs([0.1, 0.2, 0.3, 0.4]).into();
        assert_eq!(t.dims(), &[4]);
        assert_eq!(t.to_vec1::<f32>()?, vec![0.1, 0.2, 0.3, 0.4]);
        Ok(())
    }
}
