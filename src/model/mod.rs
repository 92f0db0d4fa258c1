//! Model implementations
//!
//! - Boosted trees: weight-insensitive measurements
//! - Ridge: weight-sensitive measurements
//! - Change network: relative change under a weight change

pub mod gbt;
pub mod network;
pub mod ridge;

pub use gbt::{GbtParams, GradientBoostedTrees};
pub use network::{ChangeNetwork, ChangeNetworkConfig};
pub use ridge::RidgeRegression;
