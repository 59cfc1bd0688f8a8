//! Reptile meta-learning outer loop

pub mod reptile;

pub use reptile::{interpolate, MetaConfig, MetaOutcome, ReptileTrainer, SCORE_SENTINEL};
