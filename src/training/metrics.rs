//! Training metrics and evaluation

use std::fmt;

use ndarray::Array1;

use crate::Measurement;

/// Mean absolute error
pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination.
///
/// With a constant target this is 1.0 for an exact prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Which model family produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    BoostedTrees,
    Ridge,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::BoostedTrees => f.pad("boosted trees"),
            ModelKind::Ridge => f.pad("ridge"),
        }
    }
}

/// Test-set score for one target
#[derive(Debug, Clone)]
pub struct TargetScore {
    pub target: Measurement,
    pub model: ModelKind,
    pub mae: f64,
    pub r2: f64,
}

impl TargetScore {
    pub fn compute(
        target: Measurement,
        model: ModelKind,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
    ) -> Self {
        TargetScore {
            target,
            model,
            mae: mean_absolute_error(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        }
    }
}

/// Per-target scores plus their averages
#[derive(Debug, Clone, Default)]
pub struct RegressionReport {
    pub scores: Vec<TargetScore>,
}

impl RegressionReport {
    pub fn push(&mut self, score: TargetScore) {
        self.scores.push(score);
    }

    pub fn avg_mae(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.mae).sum::<f64>() / self.scores.len() as f64
    }

    pub fn avg_r2(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.r2).sum::<f64>() / self.scores.len() as f64
    }
}

impl fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model Performance:\nAverage MAE: {:.2} cm\nAverage R² Score: {:.2}",
            self.avg_mae(),
            self.avg_r2()
        )
    }
}

/// Loss accumulated over the batches of one epoch
#[derive(Debug, Clone, Default)]
pub struct LossMetrics {
    pub total_loss: f64,
    pub batch_count: usize,
}

impl LossMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, loss: f32) {
        self.total_loss += loss as f64;
        self.batch_count += 1;
    }

    /// Mean of per-batch losses
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record an epoch; returns true when validation loss improved
    pub fn record_epoch(&mut self, epoch: usize, train: &LossMetrics, val: &LossMetrics) -> bool {
        self.train_losses.push(train.avg_loss());
        self.val_losses.push(val.avg_loss());

        if val.avg_loss() < self.best_val_loss {
            self.best_val_loss = val.avg_loss();
            self.best_epoch = epoch;
            true
        } else {
            false
        }
    }

    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mae() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![1.5, 2.0, 1.0];
        assert!((mean_absolute_error(&y, &p) - 2.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y), 1.0);

        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert_eq!(r2_score(&y, &mean), 0.0);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![3.0, 2.0, 1.0];
        // ss_res = 8, ss_tot = 2
        assert_eq!(r2_score(&y, &p), -3.0);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![5.0, 5.0];
        assert_eq!(r2_score(&y, &array![5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&y, &array![4.0, 5.0]), 0.0);
    }

    #[test]
    fn test_report_averages_and_format() {
        let mut report = RegressionReport::default();
        report.push(TargetScore {
            target: Measurement::Bicep,
            model: ModelKind::BoostedTrees,
            mae: 1.0,
            r2: 0.5,
        });
        report.push(TargetScore {
            target: Measurement::Chest,
            model: ModelKind::Ridge,
            mae: 2.0,
            r2: 0.7,
        });

        assert!((report.avg_mae() - 1.5).abs() < 1e-12);
        assert!((report.avg_r2() - 0.6).abs() < 1e-12);
        assert_eq!(
            report.to_string(),
            "Model Performance:\nAverage MAE: 1.50 cm\nAverage R² Score: 0.60"
        );
    }

    #[test]
    fn test_history_tracks_best() {
        let mut history = TrainingHistory::new();
        let mut train = LossMetrics::new();
        train.update(1.0);

        let losses = [0.9, 0.5, 0.7, 0.4];
        let improved: Vec<bool> = losses
            .iter()
            .enumerate()
            .map(|(epoch, l)| {
                let mut val = LossMetrics::new();
                val.update(*l);
                history.record_epoch(epoch, &train, &val)
            })
            .collect();

        assert_eq!(improved, vec![true, true, false, true]);
        assert_eq!(history.best_epoch, 3);
        assert!((history.best_val_loss - 0.4).abs() < 1e-6);
        assert_eq!(history.epochs(), 4);
    }
}
