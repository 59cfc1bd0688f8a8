//! Episode generation
//!
//! Drives one policy through one environment instance for at most `horizon`
//! steps, sampling each action from the policy's categorical distribution.

use anyhow::{anyhow, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

use crate::env::Environment;
use crate::policy::ActorCritic;
use crate::rollout::Trajectory;

/// Roll one episode.
///
/// Stops when the environment reports termination or after `horizon` steps,
/// whichever comes first; a horizon-truncated trajectory is valid, not an
/// error. The environment is mutated and must not be shared with any other
/// worker.
pub fn generate_episode<E: Environment>(
    policy: &ActorCritic,
    env: &mut E,
    horizon: usize,
    rng: &mut StdRng,
) -> Result<Trajectory> {
    let mut trajectory = Trajectory::default();
    let mut state = env.reset();

    for _ in 0..horizon {
        let probs = policy.action_probs(&state)?;
        let dist = WeightedIndex::new(&probs)
            .map_err(|e| anyhow!("degenerate action distribution: {e}"))?;
        let action = dist.sample(rng) as i64;

        let result = env.step(action);
        trajectory.states.push(state);
        trajectory.actions.push(action);
        trajectory.rewards.push(result.reward);

        if result.done {
            return Ok(trajectory);
        }
        state = result
            .observation
            .ok_or_else(|| anyhow!("environment returned no observation on a non-terminal step"))?;
    }

    trajectory.final_state = Some(state);
    Ok(trajectory)
}
