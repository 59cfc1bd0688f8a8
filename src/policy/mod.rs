//! Policy and value networks

pub mod actor_critic;
pub mod snapshot;

pub use actor_critic::{ActorCritic, ActorCriticConfig};
pub use snapshot::PolicySnapshot;
