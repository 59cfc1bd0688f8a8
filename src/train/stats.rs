//! Training diagnostics
//!
//! Per-minibatch loss breakdowns and the per-run reward curve, shaped for
//! external plotting or inspection.

use serde::{Deserialize, Serialize};

/// Loss terms recorded for one minibatch update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossBreakdown {
    /// Actor (policy-gradient or surrogate) loss
    pub actor: f64,

    /// Critic regression loss, when the critic is enabled
    pub critic: Option<f64>,

    /// Scaled entropy term, when the entropy bonus is enabled
    pub entropy: Option<f64>,

    /// Sum of the enabled terms; the quantity backpropagated
    pub total: f64,
}

/// Observable output of one inner training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingRun {
    /// Mean reward per outer batch
    pub mean_rewards: Vec<f64>,

    /// One breakdown per minibatch update, in execution order
    pub losses: Vec<LossBreakdown>,
}

impl TrainingRun {
    /// Sum of the per-batch mean rewards, the score a meta-iteration reports.
    pub fn cumulative_reward(&self) -> f64 {
        self.mean_rewards.iter().sum()
    }
}
