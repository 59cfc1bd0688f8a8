//! Trajectory collection and advantage estimation
//!
//! One rollout worker produces a [`Trajectory`] per episode; the estimator
//! turns it into per-step return targets and advantages; the collector pools
//! everything into a flat [`Batch`] for minibatch optimization.

pub mod collector;
pub mod episode;
pub mod estimator;

pub use collector::{collect_batch, EstimatorSettings};
pub use episode::generate_episode;
pub use estimator::AdvantageKind;

/// One episode's ordered steps.
///
/// `states[t]` is the state in which `actions[t]` was taken for reward
/// `rewards[t]`. The successor of the final step is `final_state`, which is
/// `None` when the episode terminated (there is no state to bootstrap from)
/// and the last observation when the horizon truncated the episode.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Visited states, one per decision
    pub states: Vec<Vec<f32>>,

    /// Sampled actions
    pub actions: Vec<i64>,

    /// Per-step rewards
    pub rewards: Vec<f32>,

    /// Successor of the last step, absent on termination
    pub final_state: Option<Vec<f32>>,
}

impl Trajectory {
    /// Number of steps taken.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the episode recorded no steps.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Successor state of step `t`, `None` at a terminal final step.
    pub fn successor(&self, t: usize) -> Option<&[f32]> {
        if t + 1 < self.len() {
            Some(&self.states[t + 1])
        } else {
            self.final_state.as_deref()
        }
    }
}

/// Pooled steps from a whole outer batch of trajectories.
///
/// Trajectory boundaries are not retained; within-trajectory order is
/// preserved by each worker, and ordering across trajectories carries no
/// semantic weight because targets and advantages are computed per worker
/// before merging.
#[derive(Debug, Clone)]
pub struct Batch {
    state_size: usize,

    /// Flattened states, `len() * state_size` values
    pub states: Vec<f32>,

    /// Actions, one per step
    pub actions: Vec<i64>,

    /// Critic regression targets
    pub targets: Vec<f32>,

    /// Advantage weights
    pub advantages: Vec<f32>,

    /// Raw rewards
    pub rewards: Vec<f32>,
}

impl Batch {
    /// Empty batch for states of the given size.
    pub fn new(state_size: usize) -> Self {
        Self {
            state_size,
            states: Vec::new(),
            actions: Vec::new(),
            targets: Vec::new(),
            advantages: Vec::new(),
            rewards: Vec::new(),
        }
    }

    /// Append one trajectory's steps with their estimates.
    pub fn push_trajectory(&mut self, trajectory: &Trajectory, targets: &[f32], advantages: &[f32]) {
        debug_assert_eq!(trajectory.len(), targets.len());
        debug_assert_eq!(trajectory.len(), advantages.len());

        for state in &trajectory.states {
            debug_assert_eq!(state.len(), self.state_size);
            self.states.extend_from_slice(state);
        }
        self.actions.extend_from_slice(&trajectory.actions);
        self.targets.extend_from_slice(targets);
        self.advantages.extend_from_slice(advantages);
        self.rewards.extend_from_slice(&trajectory.rewards);
    }

    /// Append another batch's steps.
    pub fn merge(&mut self, other: Batch) {
        debug_assert_eq!(self.state_size, other.state_size);
        self.states.extend(other.states);
        self.actions.extend(other.actions);
        self.targets.extend(other.targets);
        self.advantages.extend(other.advantages);
        self.rewards.extend(other.rewards);
    }

    /// Total number of pooled steps.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch holds no steps.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Length of each flattened state.
    pub fn state_size(&self) -> usize {
        self.state_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory(len: usize) -> Trajectory {
        Trajectory {
            states: vec![vec![0.0, 1.0]; len],
            actions: vec![1; len],
            rewards: vec![-1.0; len],
            final_state: None,
        }
    }

    #[test]
    fn test_successor_indexing() {
        let mut traj = trajectory(3);
        traj.states = vec![vec![0.0], vec![1.0], vec![2.0]];

        assert_eq!(traj.successor(0), Some(&[1.0f32][..]));
        assert_eq!(traj.successor(1), Some(&[2.0f32][..]));
        assert_eq!(traj.successor(2), None);

        traj.final_state = Some(vec![3.0]);
        assert_eq!(traj.successor(2), Some(&[3.0f32][..]));
    }

    #[test]
    fn test_batch_pools_step_counts() {
        let mut batch = Batch::new(2);
        batch.push_trajectory(&trajectory(3), &[0.0; 3], &[0.0; 3]);
        batch.push_trajectory(&trajectory(5), &[0.0; 5], &[0.0; 5]);

        assert_eq!(batch.len(), 8);
        assert_eq!(batch.states.len(), 8 * 2);

        let mut other = Batch::new(2);
        other.push_trajectory(&trajectory(4), &[0.0; 4], &[0.0; 4]);
        batch.merge(other);
        assert_eq!(batch.len(), 12);
    }
}
