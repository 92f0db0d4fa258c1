//! Feature extraction and encoding
//!
//! Converts loaded records into model-ready features and targets.

pub mod change;
pub mod scaler;
pub mod weight;

pub use change::{ChangeTable, WeightPerturbation};
pub use scaler::StandardScaler;
pub use weight::{RegressionTable, WeightCentering};
