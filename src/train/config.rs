//! Training configuration and schedules
//!
//! Hyperparameters for the inner training loop, plus the per-batch decay
//! schedules derived from them: the clip epsilon
//! `ε(b) = ε_base + w(b)·ε_dec` and the entropy coefficient `0.1 + w(b)`,
//! where `w(b) = (1 - b/num_batches)²` shrinks over the run.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::rollout::AdvantageKind;

/// Which policy-gradient variant to train with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Vanilla REINFORCE with Monte-Carlo advantages
    Reinforce,

    /// Advantage actor-critic with one-step TD-residual advantages
    A2c,

    /// Clipped-surrogate PPO with an old-policy snapshot
    Ppo,
}

/// Reduction convention applied uniformly to every loss term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// Sum over the minibatch
    Sum,

    /// Mean over the minibatch
    Mean,
}

/// Hyperparameters for one inner training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Training variant
    pub algorithm: Algorithm,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Discount factor λ
    pub lam: f64,

    /// Number of outer batches (gradient-update cycles)
    pub num_batches: usize,

    /// Parallel trajectories per outer batch
    pub batch_size: usize,

    /// Equal-size contiguous minibatch slices per outer batch
    pub num_mini_batches: usize,

    /// Maximum steps per episode
    pub horizon: usize,

    /// Enable the critic baseline and its regression loss
    pub use_critic: bool,

    /// Enable the entropy bonus
    pub use_entropy: bool,

    /// Normalize pooled advantages per outer batch
    pub normalize_advantages: bool,

    /// Shuffle the pooled batch before slicing minibatches
    pub shuffle_minibatches: bool,

    /// Clip the gradient norm to `max_grad_norm` before each step
    pub gradient_clipping: bool,

    /// Gradient-norm bound used when clipping is enabled
    pub max_grad_norm: f64,

    /// Base PPO clip epsilon
    pub ppo_base_epsilon: f64,

    /// Decaying component of the clip epsilon
    pub ppo_dec_epsilon: f64,

    /// Loss reduction convention
    pub reduction: Reduction,

    /// Seed for policy initialization and rollout sampling
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Ppo,
            learning_rate: 3e-4,
            lam: 0.9,
            num_batches: 100,
            batch_size: 10,
            num_mini_batches: 2,
            horizon: 100,
            use_critic: true,
            use_entropy: true,
            normalize_advantages: true,
            shuffle_minibatches: true,
            gradient_clipping: false,
            max_grad_norm: 0.5,
            ppo_base_epsilon: 0.2,
            ppo_dec_epsilon: 0.0,
            reduction: Reduction::Mean,
            seed: 1,
        }
    }
}

impl TrainConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate hyperparameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            bail!("learning_rate must be positive");
        }
        if !(0.0..=1.0).contains(&self.lam) {
            bail!("lam must be in [0, 1]");
        }
        if self.num_batches == 0 {
            bail!("num_batches must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.num_mini_batches == 0 {
            bail!("num_mini_batches must be positive");
        }
        if self.horizon == 0 {
            bail!("horizon must be positive");
        }
        if self.ppo_base_epsilon <= 0.0 && self.algorithm == Algorithm::Ppo {
            bail!("ppo_base_epsilon must be positive for PPO");
        }
        if self.ppo_dec_epsilon < 0.0 {
            bail!("ppo_dec_epsilon must be non-negative");
        }
        if self.max_grad_norm <= 0.0 {
            bail!("max_grad_norm must be positive");
        }
        Ok(())
    }

    /// Whether the importance-weighted clipped surrogate is in use.
    pub fn is_ppo(&self) -> bool {
        self.algorithm == Algorithm::Ppo
    }

    /// Advantage baseline implied by the algorithm.
    pub fn advantage_kind(&self) -> AdvantageKind {
        match self.algorithm {
            Algorithm::A2c => AdvantageKind::TdResidual,
            Algorithm::Reinforce | Algorithm::Ppo => AdvantageKind::MonteCarlo,
        }
    }

    /// Decay weight `w(b) = (1 - b/num_batches)²` for outer batch `b`.
    pub fn batch_weight(&self, batch: usize) -> f64 {
        (1.0 - batch as f64 / self.num_batches as f64).powi(2)
    }

    /// Clip epsilon for outer batch `b`.
    pub fn clip_epsilon(&self, batch: usize) -> f64 {
        self.ppo_base_epsilon + self.batch_weight(batch) * self.ppo_dec_epsilon
    }

    /// Entropy-bonus coefficient for outer batch `b`.
    pub fn entropy_coefficient(&self, batch: usize) -> f64 {
        0.1 + self.batch_weight(batch)
    }

    /// Set the training variant.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the learning rate.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the discount factor.
    pub fn lam(mut self, lam: f64) -> Self {
        self.lam = lam;
        self
    }

    /// Set the number of outer batches.
    pub fn num_batches(mut self, n: usize) -> Self {
        self.num_batches = n;
        self
    }

    /// Set the number of parallel trajectories per outer batch.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Set the number of minibatch slices.
    pub fn num_mini_batches(mut self, n: usize) -> Self {
        self.num_mini_batches = n;
        self
    }

    /// Set the episode horizon.
    pub fn horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Enable or disable the critic baseline.
    pub fn use_critic(mut self, enabled: bool) -> Self {
        self.use_critic = enabled;
        self
    }

    /// Enable or disable the entropy bonus.
    pub fn use_entropy(mut self, enabled: bool) -> Self {
        self.use_entropy = enabled;
        self
    }

    /// Enable or disable pooled advantage normalization.
    pub fn normalize_advantages(mut self, enabled: bool) -> Self {
        self.normalize_advantages = enabled;
        self
    }

    /// Enable or disable minibatch shuffling.
    pub fn shuffle_minibatches(mut self, enabled: bool) -> Self {
        self.shuffle_minibatches = enabled;
        self
    }

    /// Enable or disable gradient-norm clipping.
    pub fn gradient_clipping(mut self, enabled: bool) -> Self {
        self.gradient_clipping = enabled;
        self
    }

    /// Set the clip epsilon schedule.
    pub fn ppo_epsilon(mut self, base: f64, dec: f64) -> Self {
        self.ppo_base_epsilon = base;
        self.ppo_dec_epsilon = dec;
        self
    }

    /// Set the loss reduction convention.
    pub fn reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Set the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
