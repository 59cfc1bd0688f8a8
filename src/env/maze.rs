//! Maze navigation environment
//!
//! A rectangular grid of walls and open cells. The agent starts at a fixed
//! cell and navigates toward a goal cell with four movement actions. The
//! reward is distance-shaped: each step pays the negative Manhattan distance
//! to the goal, with an optional extra penalty for bumping into a wall.
//! Reaching the goal terminates the episode.
//!
//! The environment is fully deterministic; all stochasticity in training
//! comes from the policy's action sampling.

use anyhow::{bail, Result};

use crate::env::{Environment, StepResult};

const CELL_OPEN: f32 = 0.0;
const CELL_WALL: f32 = 1.0;
const CELL_AGENT: f32 = 2.0;
const CELL_GOAL: f32 = 3.0;

/// Deterministic grid-world maze with a distance-shaped reward.
///
/// Built from a character map where `W` is a wall, `S` the start cell,
/// `G` the goal, and a space an open cell:
///
/// ```
/// use reptile_rl::env::{Environment, MazeSimulator};
///
/// let maze = MazeSimulator::from_map(&[
///     "WWWWW",
///     "WS GW",
///     "WWWWW",
/// ]).unwrap();
/// assert_eq!(maze.state_size(), 15);
/// ```
#[derive(Debug, Clone)]
pub struct MazeSimulator {
    width: usize,
    height: usize,
    walls: Vec<bool>,
    start: (usize, usize),
    agent: (usize, usize),
    goal: (usize, usize),
    wall_penalty: f32,
    normalize_state: bool,
}

impl MazeSimulator {
    /// Parse a maze from rows of `W`/`S`/`G`/space characters.
    ///
    /// Requires a rectangular map with exactly one start and one goal, both
    /// on open cells.
    pub fn from_map(rows: &[&str]) -> Result<Self> {
        if rows.is_empty() {
            bail!("maze map must have at least one row");
        }
        let height = rows.len();
        let width = rows[0].chars().count();

        let mut walls = vec![false; width * height];
        let mut start = None;
        let mut goal = None;

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!("maze map rows must all have width {width}");
            }
            for (x, cell) in row.chars().enumerate() {
                match cell {
                    'W' => walls[y * width + x] = true,
                    ' ' => {}
                    'S' => {
                        if start.replace((x, y)).is_some() {
                            bail!("maze map has more than one start cell");
                        }
                    }
                    'G' => {
                        if goal.replace((x, y)).is_some() {
                            bail!("maze map has more than one goal cell");
                        }
                    }
                    other => bail!("unknown maze cell {other:?} at ({x}, {y})"),
                }
            }
        }

        let Some(start) = start else {
            bail!("maze map is missing a start cell");
        };
        let Some(goal) = goal else {
            bail!("maze map is missing a goal cell");
        };

        Ok(Self {
            width,
            height,
            walls,
            start,
            agent: start,
            goal,
            wall_penalty: 0.0,
            normalize_state: true,
        })
    }

    /// Set the extra penalty added when a move bumps into a wall.
    pub fn with_wall_penalty(mut self, penalty: f32) -> Self {
        self.wall_penalty = penalty;
        self
    }

    /// Enable or disable scaling of cell codes into `[0, 1]`.
    pub fn with_normalized_state(mut self, normalize: bool) -> Self {
        self.normalize_state = normalize;
        self
    }

    /// Current goal cell `(x, y)`.
    pub fn goal(&self) -> (usize, usize) {
        self.goal
    }

    fn is_wall(&self, x: usize, y: usize) -> bool {
        self.walls[y * self.width + x]
    }

    fn manhattan_to_goal(&self) -> f32 {
        let dx = self.agent.0.abs_diff(self.goal.0);
        let dy = self.agent.1.abs_diff(self.goal.1);
        (dx + dy) as f32
    }

    /// Full-board observation: one value per cell encoding open/wall/agent/
    /// goal, with the agent's marker taking precedence over the goal's.
    fn observation(&self) -> Vec<f32> {
        let scale = if self.normalize_state { CELL_GOAL } else { 1.0 };
        let mut board = vec![CELL_OPEN; self.width * self.height];
        for (i, &wall) in self.walls.iter().enumerate() {
            if wall {
                board[i] = CELL_WALL;
            }
        }
        board[self.goal.1 * self.width + self.goal.0] = CELL_GOAL;
        board[self.agent.1 * self.width + self.agent.0] = CELL_AGENT;
        for cell in &mut board {
            *cell /= scale;
        }
        board
    }

    /// Target cell for an action, or `None` when the move leaves the grid.
    fn destination(&self, action: i64) -> Option<(usize, usize)> {
        let (x, y) = self.agent;
        match action {
            0 => y.checked_sub(1).map(|y| (x, y)),
            1 => (y + 1 < self.height).then_some((x, y + 1)),
            2 => x.checked_sub(1).map(|x| (x, y)),
            3 => (x + 1 < self.width).then_some((x + 1, y)),
            _ => None,
        }
    }
}

impl Environment for MazeSimulator {
    fn generate_fresh(&self) -> Self {
        let mut fresh = self.clone();
        fresh.agent = fresh.start;
        fresh
    }

    fn reset(&mut self) -> Vec<f32> {
        self.agent = self.start;
        self.observation()
    }

    fn step(&mut self, action: i64) -> StepResult {
        let mut bumped = false;
        match self.destination(action) {
            Some((x, y)) if !self.is_wall(x, y) => self.agent = (x, y),
            _ => bumped = true,
        }

        let mut reward = -self.manhattan_to_goal();
        if bumped {
            reward += self.wall_penalty;
        }

        let done = self.agent == self.goal;
        StepResult {
            observation: (!done).then(|| self.observation()),
            reward,
            done,
        }
    }

    fn state_size(&self) -> usize {
        self.width * self.height
    }

    fn num_actions(&self) -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> MazeSimulator {
        // Single open path of length 5 from S to G.
        MazeSimulator::from_map(&[
            "WWWWWWW",
            "WS   GW",
            "WWWWWWW",
        ])
        .unwrap()
    }

    #[test]
    fn test_from_map_shapes() {
        let maze = corridor();
        assert_eq!(maze.state_size(), 21);
        assert_eq!(maze.num_actions(), 4);
        assert_eq!(maze.goal(), (5, 1));
    }

    #[test]
    fn test_from_map_rejects_bad_maps() {
        assert!(MazeSimulator::from_map(&[]).is_err());
        assert!(MazeSimulator::from_map(&["WW", "W"]).is_err());
        assert!(MazeSimulator::from_map(&["S G", "S  "]).is_err());
        assert!(MazeSimulator::from_map(&["S  "]).is_err()); // no goal
        assert!(MazeSimulator::from_map(&["S?G"]).is_err());
    }

    #[test]
    fn test_reward_is_negative_distance() {
        let mut maze = corridor();
        maze.reset();

        // Agent at x=1, goal at x=5. Moving right leaves distance 3.
        let result = maze.step(3);
        assert_eq!(result.reward, -3.0);
        assert!(!result.done);
    }

    #[test]
    fn test_wall_bump_stays_and_pays_penalty() {
        let mut maze = corridor().with_wall_penalty(-5.0);
        let before = maze.reset();

        // Moving up from the corridor hits a wall.
        let result = maze.step(0);
        assert_eq!(result.reward, -4.0 - 5.0);
        assert_eq!(result.observation.as_deref(), Some(&before[..]));
    }

    #[test]
    fn test_goal_terminates_without_observation() {
        let mut maze = corridor();
        maze.reset();

        for _ in 0..3 {
            let result = maze.step(3);
            assert!(!result.done);
        }
        let result = maze.step(3);
        assert!(result.done);
        assert!(result.observation.is_none());
        assert_eq!(result.reward, 0.0);
    }

    #[test]
    fn test_generate_fresh_is_independent() {
        let mut maze = corridor();
        maze.reset();
        maze.step(3);

        let mut fresh = maze.generate_fresh();
        let obs = fresh.reset();

        // Fresh copy starts from S even though the source had moved.
        assert_eq!(obs, corridor().reset());
        fresh.step(3);
        assert_ne!(fresh.agent, maze.start);
    }

    #[test]
    fn test_observation_normalization() {
        let raw = corridor().with_normalized_state(false).reset();
        let scaled = corridor().with_normalized_state(true).reset();

        assert_eq!(raw.iter().cloned().fold(f32::MIN, f32::max), CELL_GOAL);
        assert_eq!(scaled.iter().cloned().fold(f32::MIN, f32::max), 1.0);
    }

    #[test]
    fn test_out_of_range_action_is_a_bump() {
        let mut maze = corridor();
        maze.reset();
        let result = maze.step(7);
        assert!(!result.done);
        assert_eq!(result.reward, -4.0);
    }
}
