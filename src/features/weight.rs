//! Weight-centering features for the regression models
//!
//! `weight_difference` is weight minus the mean weight of the male subjects,
//! and `weight_diff_squared` its square.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{BodyError, BodyRecord, Measurement, Result};

/// Feature columns fed to the tree models, in order
pub const FEATURE_NAMES: [&str; 4] = [
    "height_cm",
    "weight_kg",
    "weight_difference",
    "weight_diff_squared",
];

/// Columns of `FEATURE_NAMES` used by the ridge models
pub const RIDGE_FEATURES: [usize; 2] = [2, 3];

/// Regression targets, in order
pub const TARGETS: [Measurement; 6] = [
    Measurement::Bicep,
    Measurement::Calf,
    Measurement::Chest,
    Measurement::Hip,
    Measurement::Thigh,
    Measurement::Waist,
];

/// Targets modelled with boosted trees
pub const TREE_TARGETS: [Measurement; 2] = [Measurement::Bicep, Measurement::Calf];

/// Targets modelled with ridge regression (weight-sensitive)
pub const RIDGE_TARGETS: [Measurement; 4] = [
    Measurement::Chest,
    Measurement::Hip,
    Measurement::Thigh,
    Measurement::Waist,
];

/// Centers weight on a fitted mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightCentering {
    pub mean: f64,
}

impl WeightCentering {
    pub fn fit(weights: &[f64]) -> Result<Self> {
        if weights.is_empty() {
            return Err(BodyError::EmptyDataset(
                "no weights to center".to_string(),
            ));
        }
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        Ok(WeightCentering { mean })
    }

    /// Returns `(weight_difference, weight_diff_squared)`
    pub fn transform(&self, weight_kg: f64) -> (f64, f64) {
        let diff = weight_kg - self.mean;
        (diff, diff * diff)
    }

    /// Full feature row for a subject
    pub fn features(&self, height_cm: f64, weight_kg: f64) -> [f64; 4] {
        let (diff, diff_sq) = self.transform(weight_kg);
        [height_cm, weight_kg, diff, diff_sq]
    }
}

/// Feature and target matrices for the regression pipeline
#[derive(Debug, Clone)]
pub struct RegressionTable {
    /// [n, 4] in `FEATURE_NAMES` order
    pub features: Array2<f64>,
    /// [n, 6] in `TARGETS` order
    pub targets: Array2<f64>,
    pub centering: WeightCentering,
}

impl RegressionTable {
    /// Keep male subjects, center weight, then drop rows with any missing value.
    ///
    /// The weight mean is taken over every male subject with a recorded
    /// weight, before incomplete rows are removed.
    pub fn from_records(records: &[BodyRecord]) -> Result<Self> {
        let male: Vec<&BodyRecord> = records.iter().filter(|r| r.is_male()).collect();
        log::info!("{} of {} subjects are male", male.len(), records.len());

        let weights: Vec<f64> = male.iter().filter_map(|r| r.weight_kg).collect();
        let centering = WeightCentering::fit(&weights)?;
        log::debug!("Mean male weight: {:.3} kg", centering.mean);

        let complete: Vec<&BodyRecord> = male.into_iter().filter(|r| r.is_complete()).collect();
        if complete.is_empty() {
            return Err(BodyError::EmptyDataset(
                "no complete male rows".to_string(),
            ));
        }

        let n = complete.len();
        let mut features = Array2::<f64>::zeros((n, FEATURE_NAMES.len()));
        let mut targets = Array2::<f64>::zeros((n, TARGETS.len()));

        for (i, record) in complete.iter().enumerate() {
            // is_complete guarantees these are present
            let (Some(height), Some(weight)) = (record.height_cm, record.weight_kg) else {
                continue;
            };
            for (j, value) in centering.features(height, weight).iter().enumerate() {
                features[[i, j]] = *value;
            }
            for (j, m) in TARGETS.iter().enumerate() {
                targets[[i, j]] = record.measurement(*m).unwrap_or_default();
            }
        }

        Ok(RegressionTable {
            features,
            targets,
            centering,
        })
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Target column for a measurement
    pub fn target(&self, m: Measurement) -> Option<Array1<f64>> {
        TARGETS
            .iter()
            .position(|t| *t == m)
            .map(|j| self.targets.column(j).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gender;

    fn make_record(id: &str, gender: Gender, height: f64, weight: Option<f64>) -> BodyRecord {
        let mut record = BodyRecord::new(id, gender);
        record.height_cm = Some(height);
        record.weight_kg = weight;
        for m in Measurement::ALL {
            record.set_measurement(m, Some(m.index() as f64 + height / 100.0));
        }
        record
    }

    #[test]
    fn test_centering_zero_mean() {
        let weights = [60.0, 70.0, 80.0, 90.0];
        let centering = WeightCentering::fit(&weights).unwrap();
        assert_eq!(centering.mean, 75.0);

        let total: f64 = weights.iter().map(|w| centering.transform(*w).0).sum();
        assert!(total.abs() < 1e-12);
        assert_eq!(centering.transform(80.0), (5.0, 25.0));
    }

    #[test]
    fn test_centering_empty() {
        assert!(WeightCentering::fit(&[]).is_err());
    }

    #[test]
    fn test_table_filters_and_centers() {
        let mut incomplete = make_record("c", Gender::Male, 170.0, Some(100.0));
        incomplete.set_measurement(Measurement::Ankle, None);

        let records = vec![
            make_record("a", Gender::Male, 180.0, Some(80.0)),
            make_record("b", Gender::Female, 160.0, Some(55.0)),
            incomplete,
            make_record("d", Gender::Male, 175.0, Some(60.0)),
            make_record("e", Gender::Male, 190.0, None),
        ];

        let table = RegressionTable::from_records(&records).unwrap();

        // mean over male weights including the incomplete row: (80 + 100 + 60) / 3
        assert!((table.centering.mean - 80.0).abs() < 1e-12);
        assert_eq!(table.len(), 2);
        assert_eq!(table.features.row(0).to_vec(), vec![180.0, 80.0, 0.0, 0.0]);
        assert_eq!(table.features.row(1).to_vec(), vec![175.0, 60.0, -20.0, 400.0]);

        let chest = table.target(Measurement::Chest).unwrap();
        assert_eq!(chest[0], Measurement::Chest.index() as f64 + 1.8);
        assert!(table.target(Measurement::Wrist).is_none());
    }

    #[test]
    fn test_table_requires_male_rows() {
        let records = vec![make_record("b", Gender::Female, 160.0, Some(55.0))];
        assert!(RegressionTable::from_records(&records).is_err());
    }

    #[test]
    fn test_target_partition_covers_targets() {
        let mut all: Vec<_> = TREE_TARGETS.iter().chain(RIDGE_TARGETS.iter()).copied().collect();
        all.sort();
        let mut expected = TARGETS.to_vec();
        expected.sort();
        assert_eq!(all, expected);
    }
}
