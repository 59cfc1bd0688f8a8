//! Inner-loop policy-gradient training

pub mod config;
pub mod loss;
pub mod stats;
pub mod trainer;

pub use config::{Algorithm, Reduction, TrainConfig};
pub use stats::{LossBreakdown, TrainingRun};
pub use trainer::Trainer;
