//! Body measurement prediction
//!
//! Trains models that predict body measurements from height, weight and gender:
//! boosted trees and ridge regression on tabular features, and a small dense
//! network that predicts relative measurement change under a weight change.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A body measurement column (in centimetres)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Measurement {
    Ankle,
    ArmLength,
    Bicep,
    Calf,
    Chest,
    Forearm,
    Height,
    Hip,
    LegLength,
    ShoulderBreadth,
    ShoulderToCrotch,
    Thigh,
    Waist,
    Wrist,
}

impl Measurement {
    /// Number of measurement columns
    pub const COUNT: usize = 14;

    /// All measurements in column order
    pub const ALL: [Measurement; Self::COUNT] = [
        Measurement::Ankle,
        Measurement::ArmLength,
        Measurement::Bicep,
        Measurement::Calf,
        Measurement::Chest,
        Measurement::Forearm,
        Measurement::Height,
        Measurement::Hip,
        Measurement::LegLength,
        Measurement::ShoulderBreadth,
        Measurement::ShoulderToCrotch,
        Measurement::Thigh,
        Measurement::Waist,
        Measurement::Wrist,
    ];

    /// CSV column name
    pub fn column(&self) -> &'static str {
        match self {
            Measurement::Ankle => "ankle",
            Measurement::ArmLength => "arm-length",
            Measurement::Bicep => "bicep",
            Measurement::Calf => "calf",
            Measurement::Chest => "chest",
            Measurement::Forearm => "forearm",
            Measurement::Height => "height",
            Measurement::Hip => "hip",
            Measurement::LegLength => "leg-length",
            Measurement::ShoulderBreadth => "shoulder-breadth",
            Measurement::ShoulderToCrotch => "shoulder-to-crotch",
            Measurement::Thigh => "thigh",
            Measurement::Waist => "waist",
            Measurement::Wrist => "wrist",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.column() == name)
    }

    /// Position in `ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.column())
    }
}

/// Gender label as found in the metadata files
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other(String),
}

impl Gender {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        match label.to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other(label) => label,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subject: metadata joined with body measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    pub subject_id: String,
    pub gender: Gender,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    /// Indexed by `Measurement::index`
    pub measurements: [Option<f64>; Measurement::COUNT],
}

impl BodyRecord {
    pub fn new(subject_id: impl Into<String>, gender: Gender) -> Self {
        BodyRecord {
            subject_id: subject_id.into(),
            gender,
            height_cm: None,
            weight_kg: None,
            measurements: [None; Measurement::COUNT],
        }
    }

    pub fn measurement(&self, m: Measurement) -> Option<f64> {
        self.measurements[m.index()]
    }

    pub fn set_measurement(&mut self, m: Measurement, value: Option<f64>) {
        self.measurements[m.index()] = value;
    }

    pub fn is_male(&self) -> bool {
        self.gender == Gender::Male
    }

    /// True when height, weight and every measurement are present
    pub fn is_complete(&self) -> bool {
        self.height_cm.is_some()
            && self.weight_kg.is_some()
            && self.measurements.iter().all(Option::is_some)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("No trained model at {0} - run a train command first")]
    NoModel(String),
}

pub type Result<T> = std::result::Result<T, BodyError>;

/// Application configuration loaded from bodyshape.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub regression: RegressionConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory containing the split folders
    pub root: String,
    /// Split folders, each with hwg_metadata.csv and measurements.csv
    pub splits: Vec<String>,
    /// Merged CSV consumed by the change network
    pub merged_path: String,
    /// Where models, scalers and name lists are written
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub test_size: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub ridge_alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub lr_step_size: usize,
    pub lr_gamma: f64,
    pub dropout: f64,
    pub train_ratio: f64,
    pub seed: u64,
    /// Print progress every N epochs
    pub log_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                root: ".".to_string(),
                splits: vec!["train".to_string(), "testA".to_string(), "testB".to_string()],
                merged_path: "merged_dataset.csv".to_string(),
                output_dir: ".".to_string(),
            },
            regression: RegressionConfig {
                test_size: 0.2,
                seed: 42,
                n_estimators: 200,
                learning_rate: 0.05,
                max_depth: 4,
                ridge_alpha: 0.5,
            },
            network: NetworkConfig {
                epochs: 500,
                batch_size: 8,
                learning_rate: 1e-3,
                weight_decay: 1e-4,
                lr_step_size: 100,
                lr_gamma: 0.5,
                dropout: 0.3,
                train_ratio: 0.8,
                seed: 42,
                log_every: 50,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BodyError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| BodyError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BodyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path of an artifact inside the output directory
    pub fn output_path(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.data.output_dir).join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_columns_round_trip() {
        for m in Measurement::ALL {
            assert_eq!(Measurement::from_column(m.column()), Some(m));
        }
        assert_eq!(Measurement::from_column("shoulder-to-crotch"), Some(Measurement::ShoulderToCrotch));
        assert_eq!(Measurement::from_column("neck"), None);
    }

    #[test]
    fn test_measurement_index_matches_order() {
        for (i, m) in Measurement::ALL.iter().enumerate() {
            assert_eq!(m.index(), i);
        }
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("male"), Gender::Male);
        assert_eq!(Gender::parse(" Female "), Gender::Female);
        assert_eq!(Gender::parse("x"), Gender::Other("x".to_string()));
    }

    #[test]
    fn test_record_completeness() {
        let mut record = BodyRecord::new("s1", Gender::Male);
        assert!(!record.is_complete());

        record.height_cm = Some(180.0);
        record.weight_kg = Some(80.0);
        for m in Measurement::ALL {
            record.set_measurement(m, Some(10.0));
        }
        assert!(record.is_complete());

        record.set_measurement(Measurement::Wrist, None);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bodyshape.toml");
        let path = path.to_str().unwrap();

        let config = Config::default();
        config.save(path).unwrap();
        let loaded = Config::load(path).unwrap();

        assert_eq!(loaded.regression.n_estimators, 200);
        assert_eq!(loaded.network.batch_size, 8);
        assert_eq!(loaded.data.splits, vec!["train", "testA", "testB"]);
    }
}
