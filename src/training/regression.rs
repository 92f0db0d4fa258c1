//! Regression pipeline: boosted trees and ridge models per target

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, Axis};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::features::weight::{
    RegressionTable, WeightCentering, FEATURE_NAMES, RIDGE_FEATURES, RIDGE_TARGETS, TARGETS,
    TREE_TARGETS,
};
use crate::model::{GbtParams, GradientBoostedTrees, RidgeRegression};
use crate::training::metrics::{ModelKind, RegressionReport, TargetScore};
use crate::training::split::train_test_split;
use crate::{BodyError, Measurement, RegressionConfig, Result};

pub const TREE_MODELS_FILE: &str = "xgb_models.json";
pub const RIDGE_MODELS_FILE: &str = "ridge_models.json";
pub const FEATURES_FILE: &str = "features.json";
pub const TARGETS_FILE: &str = "target.json";
pub const CENTERING_FILE: &str = "weight_centering.json";

/// Fitted models for all six targets, keyed by measurement column name
#[derive(Debug, Clone)]
pub struct RegressionModels {
    pub centering: WeightCentering,
    pub trees: BTreeMap<String, GradientBoostedTrees>,
    pub ridge: BTreeMap<String, RidgeRegression>,
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(BodyError::NoModel(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl RegressionModels {
    /// Predict one target from a full feature row (`FEATURE_NAMES` order)
    pub fn predict_target(&self, target: Measurement, features: &[f64; 4]) -> Option<f64> {
        let key = target.column();
        if let Some(model) = self.trees.get(key) {
            return Some(model.predict_row(ndarray::ArrayView1::from(&features[..])));
        }
        self.ridge.get(key).map(|model| {
            let row: Vec<f64> = RIDGE_FEATURES.iter().map(|&j| features[j]).collect();
            model.predict_row(&row)
        })
    }

    /// Predict every target for a subject
    pub fn predict(&self, height_cm: f64, weight_kg: f64) -> Vec<(Measurement, f64)> {
        let features = self.centering.features(height_cm, weight_kg);
        TARGETS
            .iter()
            .filter_map(|t| self.predict_target(*t, &features).map(|v| (*t, v)))
            .collect()
    }

    /// Write models, name lists and centering into `dir`
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        write_json(&dir.join(TREE_MODELS_FILE), &self.trees)?;
        write_json(&dir.join(RIDGE_MODELS_FILE), &self.ridge)?;
        write_json(&dir.join(FEATURES_FILE), &FEATURE_NAMES)?;
        let targets: Vec<&str> = TARGETS.iter().map(|t| t.column()).collect();
        write_json(&dir.join(TARGETS_FILE), &targets)?;
        write_json(&dir.join(CENTERING_FILE), &self.centering)?;

        log::info!("Saved regression models to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let features: Vec<String> = read_json(&dir.join(FEATURES_FILE))?;
        if features != FEATURE_NAMES {
            return Err(BodyError::Model(format!(
                "unexpected feature list {:?}",
                features
            )));
        }

        Ok(RegressionModels {
            centering: read_json(&dir.join(CENTERING_FILE))?,
            trees: read_json(&dir.join(TREE_MODELS_FILE))?,
            ridge: read_json(&dir.join(RIDGE_MODELS_FILE))?,
        })
    }
}

/// Trains tree models for weight-insensitive targets and ridge models for the rest
pub struct RegressionTrainer {
    config: RegressionConfig,
}

impl RegressionTrainer {
    pub fn new(config: RegressionConfig) -> Self {
        RegressionTrainer { config }
    }

    pub fn gbt_params(&self) -> GbtParams {
        GbtParams {
            n_estimators: self.config.n_estimators,
            learning_rate: self.config.learning_rate,
            max_depth: self.config.max_depth,
            ..Default::default()
        }
    }

    /// Split, fit every target on the training rows and score on the held-out rows
    pub fn train(&self, table: &RegressionTable) -> Result<(RegressionModels, RegressionReport)> {
        let split = train_test_split(table.len(), self.config.test_size, self.config.seed);
        if split.train.is_empty() || split.test.is_empty() {
            return Err(BodyError::EmptyDataset(format!(
                "{} rows is too few for a {:.0}% test split",
                table.len(),
                self.config.test_size * 100.0
            )));
        }

        let x_train = table.features.select(Axis(0), &split.train);
        let x_test = table.features.select(Axis(0), &split.test);
        let y_train = table.targets.select(Axis(0), &split.train);
        let y_test = table.targets.select(Axis(0), &split.test);

        let ridge_train = x_train.select(Axis(1), &RIDGE_FEATURES);
        let ridge_test = x_test.select(Axis(1), &RIDGE_FEATURES);

        let params = self.gbt_params();
        let mut models = RegressionModels {
            centering: table.centering,
            trees: BTreeMap::new(),
            ridge: BTreeMap::new(),
        };

        for target in TREE_TARGETS {
            log::info!("Fitting boosted trees for {}", target);
            let y = target_column(&y_train, target)?;
            let model = GradientBoostedTrees::fit(&x_train, &y, params)?;
            models.trees.insert(target.column().to_string(), model);
        }

        for target in RIDGE_TARGETS {
            log::info!("Fitting ridge (alpha={}) for {}", self.config.ridge_alpha, target);
            let y = target_column(&y_train, target)?;
            let model = RidgeRegression::fit(&ridge_train, &y, self.config.ridge_alpha)?;
            log::debug!(
                "  {}: coefficients={:?}, intercept={:.4}",
                target,
                model.coefficients,
                model.intercept
            );
            models.ridge.insert(target.column().to_string(), model);
        }

        let mut report = RegressionReport::default();
        for target in TARGETS {
            let y_true = target_column(&y_test, target)?;
            let score = if let Some(model) = models.ridge.get(target.column()) {
                TargetScore::compute(target, ModelKind::Ridge, &y_true, &model.predict(&ridge_test))
            } else if let Some(model) = models.trees.get(target.column()) {
                TargetScore::compute(target, ModelKind::BoostedTrees, &y_true, &model.predict(&x_test))
            } else {
                return Err(BodyError::Model(format!("no model for {}", target)));
            };
            log::info!(
                "  {:<6} ({}): MAE {:.3} cm, R² {:.3}",
                target,
                score.model,
                score.mae,
                score.r2
            );
            report.push(score);
        }

        Ok((models, report))
    }
}

fn target_column(targets: &Array2<f64>, target: Measurement) -> Result<ndarray::Array1<f64>> {
    TARGETS
        .iter()
        .position(|t| *t == target)
        .map(|j| targets.column(j).to_owned())
        .ok_or_else(|| BodyError::Model(format!("{} is not a regression target", target)))
}
