//! Parallel rollout coordination
//!
//! Fans out one worker thread per trajectory, each bound to its own fresh
//! environment and a frozen copy of the policy rebuilt from a
//! [`PolicySnapshot`], then fans the per-worker results back in through a
//! single result channel.
//!
//! The coordinator blocks twice: once draining exactly B results, and once
//! joining every worker after releasing them. A worker holds its resources
//! alive until the drain completes, and no worker from one outer batch can
//! outlive the batch. There is no cancellation or timeout; liveness is
//! bounded by the rollout horizon.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::env::Environment;
use crate::policy::{ActorCritic, ActorCriticConfig, PolicySnapshot};
use crate::rollout::episode::generate_episode;
use crate::rollout::estimator::{estimate, AdvantageKind};
use crate::rollout::Batch;

/// Estimator configuration shipped to every worker.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorSettings {
    /// Advantage baseline
    pub kind: AdvantageKind,

    /// Whether the critic baseline is enabled
    pub use_critic: bool,

    /// Discount factor
    pub lam: f32,
}

/// Everything one rollout worker needs, passed by value.
///
/// No worker ever holds a live reference into the trainer's mutable
/// parameters; the snapshot is its own detached copy.
struct RolloutTask<E> {
    snapshot: PolicySnapshot,
    arch: ActorCriticConfig,
    env: E,
    horizon: usize,
    worker_id: usize,
    seed: u64,
    settings: EstimatorSettings,
}

/// Collect one outer batch of `envs.len()` trajectories in parallel.
///
/// Each environment is consumed by exactly one worker. Per-step targets and
/// advantages are computed inside the worker, under the same frozen policy
/// that sampled the actions; merge order is completion order. Worker seeds
/// derive from `seed` plus the worker index, so a fixed seed gives a
/// reproducible batch.
pub fn collect_batch<E>(
    snapshot: &PolicySnapshot,
    arch: &ActorCriticConfig,
    envs: Vec<E>,
    horizon: usize,
    seed: u64,
    settings: EstimatorSettings,
) -> Result<Batch>
where
    E: Environment + Send + 'static,
{
    let num_workers = envs.len();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<Result<Batch>>();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

    let mut handles = Vec::with_capacity(num_workers);
    for (worker_id, env) in envs.into_iter().enumerate() {
        let task = RolloutTask {
            snapshot: snapshot.clone(),
            arch: arch.unseeded(),
            env,
            horizon,
            worker_id,
            seed: seed.wrapping_add(worker_id as u64),
            settings,
        };
        let tx = result_tx.clone();
        let release = release_rx.clone();
        handles.push(std::thread::spawn(move || rollout_worker(task, tx, release)));
    }
    drop(result_tx);
    drop(release_rx);

    // First blocking point: drain exactly one result per worker.
    let mut batch = Batch::new(arch.state_size as usize);
    for _ in 0..num_workers {
        let segment = result_rx
            .recv()
            .map_err(|_| anyhow!("rollout worker exited without sending a result"))??;
        batch.merge(segment);
    }

    // Release the workers, then the second blocking point: join them all so
    // no worker survives into the next outer batch.
    drop(release_tx);
    for handle in handles {
        handle.join().map_err(|_| anyhow!("rollout worker panicked"))?;
    }

    tracing::debug!(steps = batch.len(), workers = num_workers, "merged rollout batch");
    Ok(batch)
}

fn rollout_worker<E: Environment>(
    mut task: RolloutTask<E>,
    tx: Sender<Result<Batch>>,
    release: Receiver<()>,
) {
    let outcome = run_rollout(&mut task);
    let _ = tx.send(outcome);
    // Park until the coordinator has drained every result.
    let _ = release.recv();
}

fn run_rollout<E: Environment>(task: &mut RolloutTask<E>) -> Result<Batch> {
    let mut policy = ActorCritic::new(&task.arch);
    policy.load_snapshot(&task.snapshot)?;
    policy.freeze();

    let mut rng = StdRng::seed_from_u64(task.seed);
    let trajectory = generate_episode(&policy, &mut task.env, task.horizon, &mut rng)?;
    let estimates = estimate(
        &trajectory,
        &policy,
        task.settings.kind,
        task.settings.use_critic,
        task.settings.lam,
    )?;

    let mut segment = Batch::new(task.arch.state_size as usize);
    segment.push_trajectory(&trajectory, &estimates.targets, &estimates.advantages);
    tracing::trace!(
        worker = task.worker_id,
        steps = trajectory.len(),
        "rollout finished"
    );
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, MazeSimulator};

    /// Goal is walled off, so every trajectory truncates at the horizon.
    fn unreachable_goal() -> MazeSimulator {
        MazeSimulator::from_map(&[
            "WWWWWWW",
            "WS    W",
            "WWWWWWW",
            "WG    W",
            "WWWWWWW",
        ])
        .unwrap()
    }

    fn settings() -> EstimatorSettings {
        EstimatorSettings { kind: AdvantageKind::MonteCarlo, use_critic: false, lam: 0.9 }
    }

    #[test]
    fn test_merged_length_is_sum_of_trajectory_lengths() {
        let template = unreachable_goal();
        let arch = ActorCriticConfig::new(
            template.state_size() as i64,
            template.num_actions() as i64,
        )
        .hidden_dim(16)
        .seed(5);
        let snapshot = ActorCritic::new(&arch).snapshot();

        let horizon = 6;
        for workers in [1usize, 5, 20] {
            let envs: Vec<_> = (0..workers).map(|_| template.generate_fresh()).collect();
            let batch =
                collect_batch(&snapshot, &arch, envs, horizon, 17, settings()).unwrap();

            // Every trajectory truncates at exactly `horizon` steps here.
            assert_eq!(batch.len(), workers * horizon);
            assert_eq!(batch.states.len(), batch.len() * template.state_size());
            assert_eq!(batch.rewards.len(), batch.len());
            assert_eq!(batch.targets.len(), batch.len());
            assert_eq!(batch.advantages.len(), batch.len());
        }
    }

    #[test]
    fn test_collection_is_deterministic_per_seed() {
        let template = unreachable_goal();
        let arch = ActorCriticConfig::new(
            template.state_size() as i64,
            template.num_actions() as i64,
        )
        .hidden_dim(16)
        .seed(5);
        let snapshot = ActorCritic::new(&arch).snapshot();

        let mut collect = || {
            let envs: Vec<_> = (0..4).map(|_| template.generate_fresh()).collect();
            collect_batch(&snapshot, &arch, envs, 5, 99, settings()).unwrap()
        };

        let first = collect();
        let second = collect();

        // Merge order may differ between runs, so compare order-insensitive
        // aggregates.
        assert_eq!(first.len(), second.len());
        let sum = |b: &Batch| b.rewards.iter().sum::<f32>();
        assert!((sum(&first) - sum(&second)).abs() < 1e-5);
    }

    #[test]
    fn test_empty_env_set_produces_empty_batch() {
        let template = unreachable_goal();
        let arch = ActorCriticConfig::new(
            template.state_size() as i64,
            template.num_actions() as i64,
        )
        .hidden_dim(16);
        let snapshot = ActorCritic::new(&arch).snapshot();

        let batch =
            collect_batch::<MazeSimulator>(&snapshot, &arch, Vec::new(), 5, 0, settings())
                .unwrap();
        assert!(batch.is_empty());
    }
}
