//! Model training
//!
//! Regression pipeline, change-network training loop, and metrics tracking.

pub mod metrics;
pub mod network_trainer;
pub mod regression;
pub mod split;

pub use metrics::{LossMetrics, RegressionReport, TrainingHistory};
pub use network_trainer::{NetworkTrainer, SmoothL1Loss, StepDecay};
pub use regression::{RegressionModels, RegressionTrainer};
pub use split::train_test_split;
