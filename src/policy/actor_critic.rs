//! Actor-critic network for discrete action spaces
//!
//! A shared tanh MLP trunk feeding a categorical policy head and a scalar
//! value head. The same network serves all three training variants; the
//! critic head is simply ignored when a baseline is disabled.

use anyhow::{anyhow, Result};
use tch::{
    nn::{self, Module, OptimizerConfig},
    Device, Kind, Tensor,
};

use crate::policy::PolicySnapshot;

/// Architecture configuration for [`ActorCritic`].
#[derive(Debug, Clone)]
pub struct ActorCriticConfig {
    /// Flattened state vector length
    pub state_size: i64,

    /// Number of discrete actions
    pub num_actions: i64,

    /// Width of the hidden layers
    pub hidden_dim: i64,

    /// Seed for weight initialization; `None` leaves the global RNG alone
    /// (rollout workers pass `None` since their weights are overwritten by a
    /// snapshot anyway)
    pub seed: Option<i64>,
}

impl ActorCriticConfig {
    /// Configuration with the default hidden width of 64.
    pub fn new(state_size: i64, num_actions: i64) -> Self {
        Self { state_size, num_actions, hidden_dim: 64, seed: None }
    }

    /// Set the hidden layer width.
    pub fn hidden_dim(mut self, dim: i64) -> Self {
        self.hidden_dim = dim;
        self
    }

    /// Set the initialization seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Copy of this configuration without a seed, for rollout workers.
    pub fn unseeded(&self) -> Self {
        Self { seed: None, ..self.clone() }
    }
}

/// Shared-trunk actor-critic MLP.
pub struct ActorCritic {
    vs: nn::VarStore,
    trunk: nn::Sequential,
    policy_head: nn::Linear,
    value_head: nn::Linear,
}

impl ActorCritic {
    /// Build the network on the CPU.
    pub fn new(config: &ActorCriticConfig) -> Self {
        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
        }

        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let trunk = nn::seq()
            .add(nn::linear(
                &root / "trunk" / "fc1",
                config.state_size,
                config.hidden_dim,
                Default::default(),
            ))
            .add_fn(|x| x.tanh())
            .add(nn::linear(
                &root / "trunk" / "fc2",
                config.hidden_dim,
                config.hidden_dim,
                Default::default(),
            ))
            .add_fn(|x| x.tanh());

        let policy_head =
            nn::linear(&root / "policy", config.hidden_dim, config.num_actions, Default::default());
        let value_head = nn::linear(&root / "value", config.hidden_dim, 1, Default::default());

        Self { vs, trunk, policy_head, value_head }
    }

    /// Action logits for a batch of states `[batch, state_size]`.
    pub fn forward(&self, states: &Tensor) -> Tensor {
        self.policy_head.forward(&self.trunk.forward(states))
    }

    /// Critic value per row for a batch of states.
    pub fn value(&self, states: &Tensor) -> Tensor {
        self.value_head.forward(&self.trunk.forward(states)).squeeze_dim(-1)
    }

    /// Log probability of each given action under the current policy.
    pub fn log_prob(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let log_probs = self.forward(states).log_softmax(-1, Kind::Float);
        log_probs.gather(-1, &actions.unsqueeze(-1), false).squeeze_dim(-1)
    }

    /// Per-row entropy of the action distribution.
    pub fn entropy(&self, states: &Tensor) -> Tensor {
        let log_probs = self.forward(states).log_softmax(-1, Kind::Float);
        let probs = log_probs.exp();
        -(probs * log_probs).sum_dim_intlist(-1, false, Kind::Float)
    }

    /// Action probabilities for a single state, for categorical sampling.
    pub fn action_probs(&self, state: &[f32]) -> Result<Vec<f32>> {
        let probs = tch::no_grad(|| {
            let input = Tensor::from_slice(state).view([1, state.len() as i64]);
            self.forward(&input).softmax(-1, Kind::Float).view([-1])
        });
        Vec::try_from(probs).map_err(|e| anyhow!("failed to read action probabilities: {e}"))
    }

    /// Critic value of a single state as a scalar.
    pub fn value_scalar(&self, state: &[f32]) -> Result<f32> {
        let value = tch::no_grad(|| {
            let input = Tensor::from_slice(state).view([1, state.len() as i64]);
            self.value(&input)
        });
        let value = f64::try_from(&value).map_err(|e| anyhow!("failed to read value: {e}"))?;
        Ok(value as f32)
    }

    /// Take an immutable snapshot of the current parameters.
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot::from_named_tensors(self.vs.variables())
    }

    /// Copy a snapshot's parameters into this network.
    ///
    /// The snapshot must come from a network with the same architecture.
    pub fn load_snapshot(&mut self, snapshot: &PolicySnapshot) -> Result<()> {
        tch::no_grad(|| {
            for (name, mut variable) in self.vs.variables() {
                let source = snapshot
                    .get(&name)
                    .ok_or_else(|| anyhow!("snapshot is missing parameter {name:?}"))?;
                variable.copy_(source);
            }
            Ok(())
        })
    }

    /// Build an Adam optimizer over this network's parameters.
    pub fn optimizer(&self, learning_rate: f64) -> Result<nn::Optimizer> {
        nn::Adam::default()
            .build(&self.vs, learning_rate)
            .map_err(|e| anyhow!("failed to build optimizer: {e}"))
    }

    /// Stop tracking gradients, for frozen old-policy copies.
    pub fn freeze(&mut self) {
        self.vs.freeze();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ActorCriticConfig {
        ActorCriticConfig::new(6, 4).hidden_dim(16).seed(7)
    }

    #[test]
    fn test_forward_shapes() {
        let policy = ActorCritic::new(&config());
        let states = Tensor::randn([5, 6], (Kind::Float, Device::Cpu));

        assert_eq!(policy.forward(&states).size(), vec![5, 4]);
        assert_eq!(policy.value(&states).size(), vec![5]);
        assert_eq!(policy.entropy(&states).size(), vec![5]);
    }

    #[test]
    fn test_action_probs_sum_to_one() {
        let policy = ActorCritic::new(&config());
        let probs = policy.action_probs(&[0.0; 6]).unwrap();

        assert_eq!(probs.len(), 4);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_log_prob_matches_probs() {
        let policy = ActorCritic::new(&config());
        let state = [0.25f32, 0.0, 0.5, 0.0, 1.0, 0.0];
        let probs = policy.action_probs(&state).unwrap();

        let states = Tensor::from_slice(&state).view([1, 6]);
        let actions = Tensor::from_slice(&[2i64]);
        let log_prob = f64::try_from(&policy.log_prob(&states, &actions)).unwrap();

        assert!((log_prob - (probs[2] as f64).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_outputs() {
        let policy = ActorCritic::new(&config());
        let snapshot = policy.snapshot();

        let mut other = ActorCritic::new(&ActorCriticConfig::new(6, 4).hidden_dim(16).seed(99));
        other.load_snapshot(&snapshot).unwrap();

        let states = Tensor::randn([3, 6], (Kind::Float, Device::Cpu));
        let diff = (policy.forward(&states) - other.forward(&states))
            .abs()
            .max();
        assert!(f64::try_from(&diff).unwrap() < 1e-6);
    }

    #[test]
    fn test_load_snapshot_rejects_missing_parameters() {
        let mut policy = ActorCritic::new(&config());
        let empty = PolicySnapshot::from_named_tensors(std::iter::empty::<(String, Tensor)>());
        assert!(policy.load_snapshot(&empty).is_err());
    }

    #[test]
    fn test_seeded_init_is_deterministic() {
        let a = ActorCritic::new(&config());
        let b = ActorCritic::new(&config());

        let states = Tensor::ones([2, 6], (Kind::Float, Device::Cpu));
        let diff = (a.forward(&states) - b.forward(&states)).abs().max();
        assert!(f64::try_from(&diff).unwrap() < 1e-6);
    }
}
