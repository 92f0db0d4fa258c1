//! Per-column z-score scaling

use std::path::Path;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::{BodyError, Result};

/// Column-wise standardization: `(x - mean) / scale`
///
/// `scale` is the population standard deviation; constant columns use 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Compute from rows of equal length
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let matrix = to_matrix(rows)?;
        Ok(Self::fit_matrix(&matrix))
    }

    pub fn fit_matrix(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows().max(1) as f64;
        let mean = matrix.sum_axis(Axis(0)) / n;
        let scale = matrix
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, m)| {
                let var = col.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std < f64::EPSILON {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        StandardScaler {
            mean: mean.to_vec(),
            scale,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    pub fn inverse_transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(z, (m, s))| z * s + m)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn inverse_transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.inverse_transform_row(r)).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BodyError::NoModel(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn to_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(BodyError::Parse("rows have different lengths".to_string()));
    }
    Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|e| BodyError::Parse(e.to_string()))
}
