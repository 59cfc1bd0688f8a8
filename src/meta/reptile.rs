//! Reptile outer loop
//!
//! Maintains a meta-initialization snapshot across tasks. Each meta-iteration
//! adapts a copy of the initialization to one sampled task with the inner
//! [`Trainer`], then moves the initialization a fraction `meta_lr` of the way
//! toward the adapted parameters. A moving window over the per-task cumulative
//! rewards decides when the current initialization is worth checkpointing.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::env::Environment;
use crate::policy::{ActorCriticConfig, PolicySnapshot};
use crate::train::{TrainConfig, Trainer};

/// Filler score for unvisited window slots and the initial best score.
///
/// Finite on purpose: a window mean over `-inf` slots would itself be `-inf`
/// regardless of the real scores mixed in, which would defeat the
/// improvement test for the first few iterations.
pub const SCORE_SENTINEL: f64 = -9_999_999.0;

/// Hyperparameters for the outer meta-training loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Number of task adaptations
    pub num_meta_iterations: usize,

    /// Interpolation step toward the adapted parameters, in [0, 1]
    pub meta_lr: f64,

    /// Window length for the moving-average improvement test
    pub reward_window: usize,

    /// Where to write initialization checkpoints; `None` disables them
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            num_meta_iterations: 20,
            meta_lr: 0.1,
            reward_window: 5,
            checkpoint_dir: None,
        }
    }
}

impl MetaConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate hyperparameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.num_meta_iterations == 0 {
            bail!("num_meta_iterations must be positive");
        }
        if !(0.0..=1.0).contains(&self.meta_lr) {
            bail!("meta_lr must be in [0, 1]");
        }
        if self.reward_window == 0 {
            bail!("reward_window must be positive");
        }
        Ok(())
    }

    /// Set the number of meta-iterations.
    pub fn num_meta_iterations(mut self, n: usize) -> Self {
        self.num_meta_iterations = n;
        self
    }

    /// Set the interpolation step.
    pub fn meta_lr(mut self, meta_lr: f64) -> Self {
        self.meta_lr = meta_lr;
        self
    }

    /// Set the moving-average window length.
    pub fn reward_window(mut self, window: usize) -> Self {
        self.reward_window = window;
        self
    }

    /// Enable checkpointing into the given directory.
    pub fn checkpoint_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }
}

/// Interpolate between two parameter snapshots:
/// `new = init + meta_lr · (adapted − init)` per parameter.
///
/// Returns a fresh snapshot aliasing neither input. `meta_lr` 0 reproduces
/// `init`, 1 reproduces `adapted`.
pub fn interpolate(
    init: &PolicySnapshot,
    adapted: &PolicySnapshot,
    meta_lr: f64,
) -> Result<PolicySnapshot> {
    tch::no_grad(|| {
        let mut params = Vec::with_capacity(init.len());
        for (name, old) in init.iter() {
            let new = adapted
                .get(name)
                .ok_or_else(|| anyhow!("adapted parameters are missing {name:?}"))?;
            params.push((name.clone(), old + (new - old) * meta_lr));
        }
        Ok(PolicySnapshot::from_named_tensors(params))
    })
}

/// Observable output of one meta-training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaOutcome {
    /// Cumulative inner-run reward per meta-iteration
    pub cumulative_rewards: Vec<f64>,

    /// Meta-iterations at which the window mean strictly improved
    pub improvement_iterations: Vec<usize>,

    /// Checkpoint files written, in order
    pub checkpoints: Vec<PathBuf>,
}

/// Rotating score window seeded with [`SCORE_SENTINEL`].
struct ScoreWindow {
    scores: Vec<f64>,
    next: usize,
}

impl ScoreWindow {
    fn new(size: usize) -> Self {
        Self { scores: vec![SCORE_SENTINEL; size], next: 0 }
    }

    fn push(&mut self, score: f64) {
        self.scores[self.next] = score;
        self.next = (self.next + 1) % self.scores.len();
    }

    fn mean(&self) -> f64 {
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

/// Reptile meta-trainer over a family of tasks.
pub struct ReptileTrainer {
    config: MetaConfig,
    trainer: Trainer,
    init: PolicySnapshot,
}

impl ReptileTrainer {
    /// Build a meta-trainer; the inner trainer's freshly initialized policy
    /// becomes the starting meta-initialization.
    pub fn new(
        config: MetaConfig,
        train_config: TrainConfig,
        arch: ActorCriticConfig,
    ) -> Result<Self> {
        config.validate()?;
        let trainer = Trainer::new(train_config, arch)?;
        let init = trainer.policy().snapshot();
        Ok(Self { config, trainer, init })
    }

    /// The current meta-initialization.
    pub fn meta_initialization(&self) -> &PolicySnapshot {
        &self.init
    }

    /// Run the full outer loop, drawing one task per meta-iteration from
    /// `sample_task`.
    ///
    /// After the last iteration the final initialization is loaded back into
    /// the inner policy and, when a checkpoint directory is configured,
    /// persisted alongside the per-improvement checkpoints.
    pub fn run<E, F>(&mut self, mut sample_task: F) -> Result<MetaOutcome>
    where
        E: Environment + Send + 'static,
        F: FnMut(usize) -> E,
    {
        if let Some(dir) = &self.config.checkpoint_dir {
            fs::create_dir_all(dir)
                .map_err(|e| anyhow!("failed to create checkpoint dir {dir:?}: {e}"))?;
        }

        let mut window = ScoreWindow::new(self.config.reward_window);
        let mut best = SCORE_SENTINEL;
        let mut outcome = MetaOutcome::default();

        for meta_iteration in 0..self.config.num_meta_iterations {
            let env = sample_task(meta_iteration);

            // Adapt a copy of the initialization; stale optimizer moments
            // from the previous task must not leak into this one.
            self.trainer.load_policy_snapshot(&self.init)?;
            self.trainer.reset_optimizer()?;
            let run = self.trainer.train(&env)?;

            let adapted = self.trainer.policy().snapshot();
            self.init = interpolate(&self.init, &adapted, self.config.meta_lr)?;

            let score = run.cumulative_reward();
            outcome.cumulative_rewards.push(score);
            window.push(score);

            let window_mean = window.mean();
            if window_mean > best {
                best = window_mean;
                outcome.improvement_iterations.push(meta_iteration);
                if let Some(dir) = &self.config.checkpoint_dir {
                    let path = dir.join(format!("meta_init_{meta_iteration:04}.pt"));
                    self.init.save(&path)?;
                    outcome.checkpoints.push(path);
                }
            }

            tracing::info!(meta_iteration, score, window_mean, "meta progress");
        }

        self.trainer.load_policy_snapshot(&self.init)?;
        if let Some(dir) = &self.config.checkpoint_dir {
            let path = dir.join("meta_init_final.pt");
            self.init.save(&path)?;
            outcome.checkpoints.push(path);
        }

        Ok(outcome)
    }
}
