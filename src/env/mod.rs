//! Environment interface for episodic grid-world tasks
//!
//! Training code only ever talks to an environment through the [`Environment`]
//! trait: fresh copies for parallel rollouts, discrete steps, and the two
//! space sizes needed to shape the policy network.

/// Result of a single environment step.
///
/// `observation` is `None` exactly when `done` is true: a terminal successor
/// state is undefined and must never be evaluated by a critic.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Successor state, absent on termination
    pub observation: Option<Vec<f32>>,

    /// Reward for the transition
    pub reward: f32,

    /// Whether the episode ended with this step
    pub done: bool,
}

/// An episodic task environment with a discrete action space.
pub trait Environment {
    /// Produce an independent copy preserving this environment's
    /// configuration, with the agent back at its start state.
    ///
    /// Parallel rollout workers each receive their own fresh copy; the
    /// original instance is never shared.
    fn generate_fresh(&self) -> Self
    where
        Self: Sized;

    /// Reset to the start state and return the initial observation.
    fn reset(&mut self) -> Vec<f32>;

    /// Apply a discrete action.
    fn step(&mut self, action: i64) -> StepResult;

    /// Length of the flattened state vector.
    fn state_size(&self) -> usize;

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;
}

pub mod maze;

pub use maze::MazeSimulator;
