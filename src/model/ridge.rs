//! Ridge regression (L2-regularized least squares)
//!
//! Minimizes ||y - Xβ - b||² + α||β||² with an unpenalized intercept `b`.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::{BodyError, Result};

/// A fitted ridge model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub alpha: f64,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl RidgeRegression {
    /// Fit by centering X and y and solving (XᵀX + αI)β = Xᵀy
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        if alpha < 0.0 {
            return Err(BodyError::Model(format!("invalid alpha {}", alpha)));
        }
        if x.nrows() == 0 {
            return Err(BodyError::EmptyDataset("ridge fit with no rows".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(BodyError::Model(format!(
                "dimension mismatch: {} rows, {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| BodyError::Model("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean;
        let y_centered = y - y_mean;

        let mut xtx = x_centered.t().dot(&x_centered);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += alpha;
        }
        let xty = x_centered.t().dot(&y_centered);

        let beta = cholesky_solve(&xtx, &xty)?;
        let intercept = y_mean - x_mean.dot(&beta);

        Ok(RidgeRegression {
            alpha,
            coefficients: beta.to_vec(),
            intercept,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(self.coefficients.iter())
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let beta = Array1::from(self.coefficients.clone());
        x.dot(&beta) + self.intercept
    }
}

/// Solve a symmetric positive-definite system via Cholesky decomposition
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return Err(BodyError::Model(
                        "matrix not positive definite (collinear features with alpha = 0?)"
                            .to_string(),
                    ));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_coefficients() {
        // y = 3 + 2*x0 - 0.5*x1
        let x = array![[1.0, 4.0], [2.0, 1.0], [3.0, 9.0], [4.0, 16.0], [5.0, 2.0]];
        let y = x.map_axis(Axis(1), |r| 3.0 + 2.0 * r[0] - 0.5 * r[1]);

        let model = RidgeRegression::fit(&x, &y, 1e-10).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-6);
        assert!((model.intercept - 3.0).abs() < 1e-6);

        let preds = model.predict(&x);
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_alpha_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let weak = RidgeRegression::fit(&x, &y, 0.1).unwrap();
        let strong = RidgeRegression::fit(&x, &y, 100.0).unwrap();

        assert!(strong.coefficients[0].abs() < weak.coefficients[0].abs());
        // centered x has Σx² = 5, so β = 2*5 / (5 + α)
        assert!((weak.coefficients[0] - 10.0 / 5.1).abs() < 1e-12);
        // intercept keeps predictions centered on the target mean
        assert!((strong.predict_row(&[2.5]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_row_matches_predict() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 3.0]];
        let y = array![1.0, 2.0, 3.5, 7.0];
        let model = RidgeRegression::fit(&x, &y, 0.5).unwrap();

        let batch = model.predict(&x);
        for (i, row) in x.rows().into_iter().enumerate() {
            assert!((model.predict_row(&row.to_vec()) - batch[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert!(RidgeRegression::fit(&x, &y, 0.5).is_err());
        assert!(RidgeRegression::fit(&x, &array![1.0, 2.0], -1.0).is_err());

        // constant feature without regularization is singular
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(RidgeRegression::fit(&x, &y, 0.0).is_err());
    }
}
