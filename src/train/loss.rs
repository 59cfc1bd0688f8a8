//! Objective computation
//!
//! Loss terms over batched tensors: the vanilla policy-gradient loss, the
//! PPO clipped surrogate, the entropy bonus, and the smooth-L1 critic loss.
//! One [`Reduction`] convention is applied to every term.

use tch::{Kind, Tensor};

use crate::train::config::Reduction;

fn reduce(t: &Tensor, reduction: Reduction) -> Tensor {
    match reduction {
        Reduction::Sum => t.sum(Kind::Float),
        Reduction::Mean => t.mean(Kind::Float),
    }
}

/// Vanilla policy-gradient loss: `-Σ log π(a|s) · advantage`.
pub fn policy_gradient_loss(
    log_probs: &Tensor,
    advantages: &Tensor,
    reduction: Reduction,
) -> Tensor {
    -reduce(&(log_probs * advantages), reduction)
}

/// PPO clipped-surrogate loss.
///
/// `old_log_probs` must come from the frozen snapshot that collected the
/// rollouts; it is detached here so no gradient flows into the old policy.
/// When old and current policies coincide (the first outer batch) the ratio
/// is 1 everywhere and the clipped and unclipped surrogates collapse to the
/// same value.
pub fn clipped_surrogate_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    epsilon: f64,
    reduction: Reduction,
) -> Tensor {
    let ratios = (log_probs - old_log_probs.detach()).exp();
    let unclipped = &ratios * advantages;
    let clipped = ratios.clamp(1.0 - epsilon, 1.0 + epsilon) * advantages;
    -reduce(&unclipped.minimum(&clipped), reduction)
}

/// Entropy bonus: the negative entropy of the current action distribution.
///
/// Added to the total loss (scaled by the schedule's coefficient) so that
/// minimizing the total keeps entropy up and discourages premature
/// convergence.
pub fn entropy_loss(entropy: &Tensor, reduction: Reduction) -> Tensor {
    -reduce(entropy, reduction)
}

/// Smooth-L1 (Huber) regression loss between critic predictions and targets.
pub fn critic_loss(values: &Tensor, targets: &Tensor, reduction: Reduction) -> Tensor {
    let reduction = match reduction {
        Reduction::Sum => tch::Reduction::Sum,
        Reduction::Mean => tch::Reduction::Mean,
    };
    values.smooth_l1_loss(targets, reduction, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(t: &Tensor) -> f64 {
        f64::try_from(t).unwrap()
    }

    #[test]
    fn test_policy_gradient_loss_sign_and_reduction() {
        let log_probs = Tensor::from_slice(&[-1.0f32, -2.0]);
        let advantages = Tensor::from_slice(&[1.0f32, 2.0]);

        let sum = policy_gradient_loss(&log_probs, &advantages, Reduction::Sum);
        let mean = policy_gradient_loss(&log_probs, &advantages, Reduction::Mean);

        // -(-1*1 + -2*2) = 5, mean halves it.
        assert!((scalar(&sum) - 5.0).abs() < 1e-6);
        assert!((scalar(&mean) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_identical_policies_give_neutral_ratio() {
        let log_probs = Tensor::from_slice(&[-0.7f32, -1.3, -0.2]);
        let advantages = Tensor::from_slice(&[0.5f32, -1.0, 2.0]);

        let surrogate = clipped_surrogate_loss(
            &log_probs,
            &log_probs,
            &advantages,
            0.2,
            Reduction::Sum,
        );

        // Ratio 1 everywhere: the surrogate reduces to -Σ advantages.
        let expected = -scalar(&advantages.sum(Kind::Float));
        assert!((scalar(&surrogate) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_clipping_caps_positive_advantage_gain() {
        let epsilon = 0.1;
        // Ratio well above 1 + epsilon.
        let log_probs = Tensor::from_slice(&[0.0f32]);
        let old_log_probs = Tensor::from_slice(&[-1.0f32]);
        let advantages = Tensor::from_slice(&[2.0f32]);

        let clipped = clipped_surrogate_loss(
            &log_probs,
            &old_log_probs,
            &advantages,
            epsilon,
            Reduction::Sum,
        );

        // The clipped surrogate is bounded by (1 + epsilon) * advantage even
        // though the raw ratio is e ≈ 2.72.
        assert!((scalar(&clipped) + (1.0 + epsilon) * 2.0).abs() < 1e-6);

        let unclipped_gain = (1.0f64).exp() * 2.0;
        assert!(scalar(&clipped).abs() < unclipped_gain);
    }

    #[test]
    fn test_clipping_keeps_pessimistic_bound_below_ratio() {
        let epsilon = 0.2;
        let log_probs = Tensor::from_slice(&[-2.0f32]);
        let old_log_probs = Tensor::from_slice(&[0.0f32]);
        let advantages = Tensor::from_slice(&[-1.5f32]);

        // Negative advantage with a shrinking ratio: the minimum picks the
        // unclipped (more pessimistic) branch.
        let loss = clipped_surrogate_loss(
            &log_probs,
            &old_log_probs,
            &advantages,
            epsilon,
            Reduction::Sum,
        );
        let ratio = (-2.0f64).exp();
        let clipped_branch = (1.0 - epsilon) * -1.5;
        let unclipped_branch = ratio * -1.5;
        let expected = -unclipped_branch.min(clipped_branch);
        assert!((scalar(&loss) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_entropy_loss_is_negated() {
        let entropy = Tensor::from_slice(&[0.5f32, 1.5]);
        assert!((scalar(&entropy_loss(&entropy, Reduction::Sum)) + 2.0).abs() < 1e-6);
        assert!((scalar(&entropy_loss(&entropy, Reduction::Mean)) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_critic_loss_is_huber() {
        let values = Tensor::from_slice(&[0.0f32, 0.0]);
        let targets = Tensor::from_slice(&[0.5f32, 4.0]);

        // |err| < 1 is quadratic (0.5 * 0.25), |err| >= 1 is linear (4 - 0.5).
        let expected = 0.5 * 0.25 + 3.5;
        let loss = critic_loss(&values, &targets, Reduction::Sum);
        assert!((scalar(&loss) - expected).abs() < 1e-5);
    }
}
