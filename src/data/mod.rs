//! Data ingestion
//!
//! CSV loading/merging and the burn dataset used by the change network.

pub mod dataset;
pub mod loader;

pub use dataset::{ChangeBatch, ChangeBatcher, ChangeDataset, ChangeSample};
pub use loader::{load_merged, load_split, load_splits, write_merged, DatasetSummary};
