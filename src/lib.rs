//! # Reptile-RL
//!
//! Policy-gradient training for grid-world maze navigation, with a Reptile
//! meta-learning outer loop
//!
//! Three inner-loop variants share one actor-critic network and one rollout
//! pipeline: REINFORCE, advantage actor-critic (A2C), and clipped-surrogate
//! PPO. Rollouts fan out across threads, each worker holding its own frozen
//! parameter snapshot, and the pooled batch drives minibatch updates. On top
//! of the inner loop, [`meta::ReptileTrainer`] adapts a shared initialization
//! across a family of maze tasks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reptile_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = MazeSimulator::from_map(&[
//!     "WWWWWWW",
//!     "WS   GW",
//!     "WWWWWWW",
//! ])?;
//!
//! let config = TrainConfig::new().algorithm(Algorithm::Ppo).num_batches(50);
//! let arch = ActorCriticConfig::new(env.state_size() as i64, env.num_actions() as i64);
//!
//! let mut trainer = Trainer::new(config, arch)?;
//! let run = trainer.train(&env)?;
//! println!("cumulative reward: {}", run.cumulative_reward());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment trait and the maze simulator
pub mod env;

/// Reptile meta-learning outer loop
pub mod meta;

/// Actor-critic network and parameter snapshots
pub mod policy;

/// Parallel trajectory collection and advantage estimation
pub mod rollout;

/// Inner-loop policy-gradient training
pub mod train;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::env::{Environment, MazeSimulator, StepResult};
    pub use crate::meta::{MetaConfig, MetaOutcome, ReptileTrainer};
    pub use crate::policy::{ActorCritic, ActorCriticConfig, PolicySnapshot};
    pub use crate::rollout::{AdvantageKind, Batch, Trajectory};
    pub use crate::train::{Algorithm, Reduction, TrainConfig, Trainer, TrainingRun};
}

/// Current version of reptile-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
