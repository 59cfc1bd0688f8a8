//! Return and advantage estimation
//!
//! Converts one trajectory into per-step critic targets and advantage
//! weights. Two baselines are supported: the Monte-Carlo advantage
//! `G_t - V(S_t)` and the one-step TD residual `R_t + λ·V(S_{t+1}) - V(S_t)`.
//! The critic regression target is the discounted return `G_t` in both
//! cases; target and advantage are deliberately decoupled.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::policy::ActorCritic;
use crate::rollout::Trajectory;

/// Which advantage baseline to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvantageKind {
    /// `G_t - V(S_t)`, or plain `G_t` when the critic is disabled
    MonteCarlo,

    /// `R_t + λ·V(S_{t+1}) - V(S_t)`, with `R_t - V(S_t)` at a terminal step
    TdResidual,
}

/// Per-step targets and advantages for one trajectory.
#[derive(Debug, Clone)]
pub struct StepEstimates {
    /// Critic regression targets (discounted returns)
    pub targets: Vec<f32>,

    /// Advantage weights for the policy gradient
    pub advantages: Vec<f32>,
}

/// Finite-horizon discounted returns-to-go.
///
/// Computed by the backward recursion `G_t = R_t + λ·G_{t+1}` with
/// `G_T = 0`; no bootstrap beyond the trajectory's own end.
pub fn discounted_returns(rewards: &[f32], lam: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut tail = 0.0;
    for t in (0..rewards.len()).rev() {
        tail = rewards[t] + lam * tail;
        returns[t] = tail;
    }
    returns
}

/// Estimate targets and advantages for one trajectory.
///
/// With `use_critic` off the advantage is the raw return regardless of
/// `kind`. The terminal step never evaluates the critic on a successor
/// state; there is none.
pub fn estimate(
    trajectory: &Trajectory,
    policy: &ActorCritic,
    kind: AdvantageKind,
    use_critic: bool,
    lam: f32,
) -> Result<StepEstimates> {
    let returns = discounted_returns(&trajectory.rewards, lam);
    let mut advantages = vec![0.0; trajectory.len()];

    for t in 0..trajectory.len() {
        advantages[t] = if !use_critic {
            returns[t]
        } else {
            let value = policy.value_scalar(&trajectory.states[t])?;
            match kind {
                AdvantageKind::MonteCarlo => returns[t] - value,
                AdvantageKind::TdResidual => match trajectory.successor(t) {
                    Some(next) => {
                        trajectory.rewards[t] + lam * policy.value_scalar(next)? - value
                    }
                    None => trajectory.rewards[t] - value,
                },
            }
        };
    }

    Ok(StepEstimates { targets: returns, advantages })
}

/// Normalize pooled advantages to zero mean and unit standard deviation.
///
/// Must be applied after all trajectories in the outer batch are pooled,
/// never per trajectory. A zero-variance batch is left unchanged.
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    let var = advantages.iter().map(|a| (a - mean) * (a - mean)).sum::<f32>() / n;
    let std = var.sqrt();
    if std == 0.0 {
        return;
    }

    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}
