//! Inner training loop
//!
//! One `Trainer` owns the trainable policy, the frozen old-policy copy used
//! for PPO ratios, and the optimizer. Each outer batch runs
//! rollout → estimate → optimize: collect B trajectories under a frozen
//! snapshot, pool and optionally normalize advantages, then take one
//! gradient step per minibatch slice. After the updates, PPO refreshes the
//! old-policy snapshot with the pre-update parameters so the next batch's
//! ratios compare against this batch's rollout policy.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::{nn, Tensor};

use crate::env::Environment;
use crate::policy::{ActorCritic, ActorCriticConfig, PolicySnapshot};
use crate::rollout::collector::{collect_batch, EstimatorSettings};
use crate::rollout::estimator::normalize_advantages;
use crate::rollout::Batch;
use crate::train::config::TrainConfig;
use crate::train::loss::{
    clipped_surrogate_loss, critic_loss, entropy_loss, policy_gradient_loss,
};
use crate::train::stats::{LossBreakdown, TrainingRun};

/// Policy-gradient trainer for a single task.
pub struct Trainer {
    config: TrainConfig,
    arch: ActorCriticConfig,
    policy: ActorCritic,
    old_policy: ActorCritic,
    optimizer: nn::Optimizer,
    rng: StdRng,
}

impl Trainer {
    /// Build a trainer with a freshly initialized policy.
    ///
    /// If `arch` carries no seed, the config's seed is used so runs are
    /// reproducible end to end.
    pub fn new(config: TrainConfig, arch: ActorCriticConfig) -> Result<Self> {
        config.validate()?;

        let mut arch = arch;
        if arch.seed.is_none() {
            arch.seed = Some(config.seed as i64);
        }

        let policy = ActorCritic::new(&arch);
        let mut old_policy = ActorCritic::new(&arch.unseeded());
        old_policy.load_snapshot(&policy.snapshot())?;
        old_policy.freeze();

        let optimizer = policy.optimizer(config.learning_rate)?;
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Self { config, arch, policy, old_policy, optimizer, rng })
    }

    /// The trainable policy.
    pub fn policy(&self) -> &ActorCritic {
        &self.policy
    }

    /// The configuration this trainer runs with.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Copy a snapshot into the trainable policy.
    pub fn load_policy_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        self.policy.load_snapshot(snapshot)
    }

    /// Rebuild the optimizer, clearing its moment estimates.
    ///
    /// Meta-training calls this before each task; stale Adam moments from
    /// the previous task would bias the next adaptation.
    pub fn reset_optimizer(&mut self) -> Result<()> {
        self.optimizer = self.policy.optimizer(self.config.learning_rate)?;
        Ok(())
    }

    /// Train for `num_batches` outer batches, drawing `batch_size` fresh
    /// environments from `env` per batch.
    pub fn train<E>(&mut self, env: &E) -> Result<TrainingRun>
    where
        E: Environment + Send + 'static,
    {
        let batch_size = self.config.batch_size;
        self.run_loop(|| (0..batch_size).map(|_| env.generate_fresh()).collect())
    }

    /// Train against a caller-supplied set of environments.
    ///
    /// The set's size must match the configured batch size; a mismatch is
    /// fatal before any rollout starts. Each outer batch works on fresh
    /// copies so the supplied instances are never mutated.
    pub fn train_with_envs<E>(&mut self, batch_envs: &[E]) -> Result<TrainingRun>
    where
        E: Environment + Send + 'static,
    {
        if batch_envs.len() != self.config.batch_size {
            bail!(
                "supplied {} environments but batch_size is {}",
                batch_envs.len(),
                self.config.batch_size
            );
        }
        self.run_loop(|| batch_envs.iter().map(Environment::generate_fresh).collect())
    }

    fn run_loop<E, F>(&mut self, mut make_envs: F) -> Result<TrainingRun>
    where
        E: Environment + Send + 'static,
        F: FnMut() -> Vec<E>,
    {
        let mut run = TrainingRun::default();

        // PPO ratios need an old policy before the first batch; start it at
        // the current parameters so the first ratio is neutral.
        if self.config.is_ppo() {
            self.old_policy.load_snapshot(&self.policy.snapshot())?;
        }

        let settings = EstimatorSettings {
            kind: self.config.advantage_kind(),
            use_critic: self.config.use_critic,
            lam: self.config.lam as f32,
        };

        for batch_index in 0..self.config.num_batches {
            let envs = make_envs();

            // Rollouts always run under a frozen policy: the old one for
            // PPO so in-batch ratios stay consistent, else the current one.
            let rollout_policy = if self.config.is_ppo() {
                self.old_policy.snapshot()
            } else {
                self.policy.snapshot()
            };
            let rollout_seed = self
                .config
                .seed
                .wrapping_add((batch_index * self.config.batch_size) as u64);

            let mut batch = collect_batch(
                &rollout_policy,
                &self.arch,
                envs,
                self.config.horizon,
                rollout_seed,
                settings,
            )?;

            let mean_reward = batch.rewards.iter().map(|&r| r as f64).sum::<f64>()
                / self.config.batch_size as f64;
            run.mean_rewards.push(mean_reward);

            if self.config.normalize_advantages {
                normalize_advantages(&mut batch.advantages);
            }

            let pre_update = self.config.is_ppo().then(|| self.policy.snapshot());

            self.optimize_batch(&batch, batch_index, &mut run.losses)?;

            // The next batch's ratios compare against this batch's rollout
            // policy, i.e. the parameters as they stood before optimizing.
            if let Some(snapshot) = pre_update {
                self.old_policy.load_snapshot(&snapshot)?;
            }

            if batch_index % 10 == 0 {
                tracing::info!(batch = batch_index, mean_reward, "training progress");
            }
        }

        Ok(run)
    }

    fn optimize_batch(
        &mut self,
        batch: &Batch,
        batch_index: usize,
        losses: &mut Vec<LossBreakdown>,
    ) -> Result<()> {
        let n = batch.len();
        let slice_len = n / self.config.num_mini_batches;
        if slice_len == 0 {
            bail!(
                "batch of {n} steps cannot fill {} minibatches",
                self.config.num_mini_batches
            );
        }

        let states = Tensor::from_slice(&batch.states)
            .view([n as i64, batch.state_size() as i64]);
        let actions = Tensor::from_slice(&batch.actions);
        let advantages = Tensor::from_slice(&batch.advantages);
        let targets = Tensor::from_slice(&batch.targets);

        let mut indices: Vec<i64> = (0..n as i64).collect();
        if self.config.shuffle_minibatches {
            indices.shuffle(&mut self.rng);
        }

        let epsilon = self.config.clip_epsilon(batch_index);
        let entropy_coef = self.config.entropy_coefficient(batch_index);
        let reduction = self.config.reduction;

        for m in 0..self.config.num_mini_batches {
            let slice = Tensor::from_slice(&indices[m * slice_len..(m + 1) * slice_len]);
            let mb_states = states.index_select(0, &slice);
            let mb_actions = actions.index_select(0, &slice);
            let mb_advantages = advantages.index_select(0, &slice);
            let mb_targets = targets.index_select(0, &slice);

            let log_probs = self.policy.log_prob(&mb_states, &mb_actions);
            let actor = if self.config.is_ppo() {
                let old_log_probs =
                    tch::no_grad(|| self.old_policy.log_prob(&mb_states, &mb_actions));
                clipped_surrogate_loss(&log_probs, &old_log_probs, &mb_advantages, epsilon, reduction)
            } else {
                policy_gradient_loss(&log_probs, &mb_advantages, reduction)
            };

            let mut breakdown = LossBreakdown {
                actor: f64::try_from(&actor).unwrap_or(0.0),
                critic: None,
                entropy: None,
                total: 0.0,
            };
            let mut total = actor;

            if self.config.use_critic {
                let critic = critic_loss(&self.policy.value(&mb_states), &mb_targets, reduction);
                breakdown.critic = Some(f64::try_from(&critic).unwrap_or(0.0));
                total = total + critic;
            }
            if self.config.use_entropy {
                let entropy =
                    entropy_loss(&self.policy.entropy(&mb_states), reduction) * entropy_coef;
                breakdown.entropy = Some(f64::try_from(&entropy).unwrap_or(0.0));
                total = total + entropy;
            }
            breakdown.total = f64::try_from(&total).unwrap_or(0.0);

            self.optimizer.zero_grad();
            total.backward();
            if self.config.gradient_clipping {
                self.optimizer.clip_grad_norm(self.config.max_grad_norm);
            }
            self.optimizer.step();

            losses.push(breakdown);
        }

        Ok(())
    }
}
