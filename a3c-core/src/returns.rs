//! Bootstrapped discounted returns.

/// Computes n-step discounted returns of a reward sequence.
///
/// `rewards` is ordered from the oldest to the most recent step. `bootstrap` is the value
/// estimate of the state following the last step, or `None` if the last step terminated the
/// episode. The returned vector has the same length and order as `rewards`:
///
/// ```text
/// R_{k-1} = r_{k-1} + gamma * bootstrap
/// R_i     = r_i + gamma * R_{i+1}
/// ```
///
/// ```rust
/// use a3c_core::n_step_returns;
///
/// let returns = n_step_returns(&[1.0, 1.0, 1.0], None, 0.5);
/// assert_eq!(returns, vec![1.75, 1.5, 1.0]);
/// ```
pub fn n_step_returns(rewards: &[f32], bootstrap: Option<f32>, gamma: f32) -> Vec<f32> {
    let mut r = bootstrap.unwrap_or(0.0);
    let mut returns = vec![0f32; rewards.len()];

    for (ret, reward) in returns.iter_mut().zip(rewards.iter()).rev() {
        r = reward + gamma * r;
        *ret = r;
    }

    returns
}

#[cfg(test)]
mod test {
    use super::n_step_returns;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_terminal() {
        assert_close(&n_step_returns(&[1.0, 1.0, 1.0], None, 0.5), &[1.75, 1.5, 1.0]);
    }

    #[test]
    fn test_closed_form() {
        let rewards = [0.3f32, -1.0, 2.0, 0.0, 0.5];
        let gamma = 0.9f32;
        let expected = (0..rewards.len())
            .map(|i| {
                (i..rewards.len())
                    .map(|j| gamma.powi((j - i) as i32) * rewards[j])
                    .sum::<f32>()
            })
            .collect::<Vec<_>>();
        assert_close(&n_step_returns(&rewards, None, gamma), &expected);
    }

    #[test]
    fn test_bootstrap() {
        let returns = n_step_returns(&[1.0, 2.0], Some(10.0), 0.5);
        // R_1 = 2 + 0.5 * 10, R_0 = 1 + 0.5 * 7
        assert_close(&returns, &[4.5, 7.0]);
    }

    #[test]
    fn test_bootstrap_ignored_when_terminal() {
        let a = n_step_returns(&[1.0, 2.0], None, 0.9);
        let b = n_step_returns(&[1.0, 2.0], Some(0.0), 0.9);
        assert_close(&a, &b);
    }

    #[test]
    fn test_empty() {
        assert!(n_step_returns(&[], Some(3.0), 0.9).is_empty());
    }
}
