//! Training loop for the change network

use std::path::PathBuf;

use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{ChangeBatch, ChangeBatcher, ChangeDataset};
use crate::model::network::ChangeNetwork;
use crate::training::metrics::{LossMetrics, TrainingHistory};
use crate::{BodyError, NetworkConfig, Result};

pub const INPUT_SCALER_FILE: &str = "scaler_input.json";
pub const OUTPUT_SCALER_FILE: &str = "scaler_output.json";
/// Checkpoint base name; the recorder adds `.mpk`
pub const CHECKPOINT_NAME: &str = "best_model";

/// Smooth L1 (Huber-style) loss, averaged over every element
pub struct SmoothL1Loss {
    pub beta: f32,
}

impl Default for SmoothL1Loss {
    fn default() -> Self {
        SmoothL1Loss { beta: 1.0 }
    }
}

impl SmoothL1Loss {
    /// 0.5 * d² / beta where |d| < beta, |d| - 0.5 * beta elsewhere
    pub fn forward<B: Backend>(&self, predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let abs = (predictions - targets).abs();
        let quadratic = abs.clone().clamp_max(self.beta);
        let linear = abs - quadratic.clone();
        (quadratic.powf_scalar(2.0) * (0.5 / self.beta) + linear).mean()
    }
}

/// Learning rate halved (by `gamma`) every `step_size` epochs
#[derive(Debug, Clone, Copy)]
pub struct StepDecay {
    pub base: f64,
    pub step_size: usize,
    pub gamma: f64,
}

impl StepDecay {
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        if self.step_size == 0 {
            return self.base;
        }
        self.base * self.gamma.powi((epoch / self.step_size) as i32)
    }
}

/// Trainer for the change network
pub struct NetworkTrainer<B: AutodiffBackend> {
    model: ChangeNetwork<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, ChangeNetwork<B>, B>,
    schedule: StepDecay,
    loss_fn: SmoothL1Loss,
    config: NetworkConfig,
    checkpoint: Option<PathBuf>,
    device: B::Device,
}

impl<B: AutodiffBackend> NetworkTrainer<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(model: ChangeNetwork<B>, config: NetworkConfig, device: B::Device) -> Self {
        let optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)))
            .init();

        NetworkTrainer {
            model,
            optimizer,
            schedule: StepDecay {
                base: config.learning_rate,
                step_size: config.lr_step_size,
                gamma: config.lr_gamma,
            },
            loss_fn: SmoothL1Loss::default(),
            config,
            checkpoint: None,
            device,
        }
    }

    /// Save weights here (with `.mpk` appended) whenever validation loss improves
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    /// Train the model, returning the best model by validation loss
    pub fn train(
        mut self,
        train_dataset: ChangeDataset,
        val_dataset: ChangeDataset,
    ) -> Result<(ChangeNetwork<B>, TrainingHistory)> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 {
            return Err(BodyError::Config("batch_size must be positive".to_string()));
        }
        for (name, dataset) in [("training", &train_dataset), ("validation", &val_dataset)] {
            if dataset.len() < batch_size {
                return Err(BodyError::EmptyDataset(format!(
                    "{} set has {} samples, fewer than one batch of {}",
                    name,
                    dataset.len(),
                    batch_size
                )));
            }
        }

        let batcher_train = ChangeBatcher::<B>::new(self.device.clone());
        let batcher_val = ChangeBatcher::<B::InnerBackend>::new(self.device.clone());

        let train_loader = DataLoaderBuilder::new(batcher_train)
            .batch_size(batch_size)
            .shuffle(self.config.seed)
            .build(train_dataset);

        let val_loader = DataLoaderBuilder::new(batcher_val)
            .batch_size(batch_size)
            .build(val_dataset);

        let epochs = self.config.epochs;
        let log_every = self.config.log_every;
        let mut history = TrainingHistory::new();
        let mut best_model = self.model.clone();

        log::info!("Starting training for {} epochs", epochs);

        for epoch in 0..epochs {
            let learning_rate = self.schedule.learning_rate(epoch);
            let train_metrics = self.train_epoch(train_loader.iter(), learning_rate);
            let val_metrics = self.validate_epoch(val_loader.iter());

            if history.record_epoch(epoch, &train_metrics, &val_metrics) {
                best_model = self.model.clone();
                if let Some(path) = &self.checkpoint {
                    self.model.save(path)?;
                }
                log::debug!("  New best model (val_loss: {:.6})", val_metrics.avg_loss());
            }

            if should_log(epoch, log_every) {
                log::info!(
                    "Epoch {}/{}, Train Loss: {:.4}, Validation Loss: {:.4}, Best Val Loss: {:.4}",
                    epoch + 1,
                    epochs,
                    train_metrics.avg_loss(),
                    val_metrics.avg_loss(),
                    history.best_val_loss
                );
            }
        }

        log::info!(
            "Training complete. Best model saved with validation loss: {:.4} (epoch {})",
            history.best_val_loss,
            history.best_epoch + 1
        );

        Ok((best_model, history))
    }

    /// Train one epoch; batches smaller than `batch_size` are skipped
    fn train_epoch(
        &mut self,
        loader: impl Iterator<Item = ChangeBatch<B>>,
        learning_rate: f64,
    ) -> LossMetrics {
        let mut metrics = LossMetrics::new();

        for batch in loader {
            let batch_size = batch.inputs.dims()[0];
            if batch_size < self.config.batch_size {
                continue;
            }

            let predictions = self.model.forward(batch.inputs);
            let loss = self.loss_fn.forward(predictions, batch.targets);
            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);

            metrics.update(loss_val);
        }

        metrics
    }

    /// Validate one epoch in inference mode (no dropout, running batch-norm statistics)
    fn validate_epoch(&self, loader: impl Iterator<Item = ChangeBatch<B::InnerBackend>>) -> LossMetrics {
        let model = self.model.valid();
        let mut metrics = LossMetrics::new();

        for batch in loader {
            let batch_size = batch.inputs.dims()[0];
            if batch_size < self.config.batch_size {
                continue;
            }

            let predictions = model.forward(batch.inputs);
            let loss = self.loss_fn.forward(predictions, batch.targets);
            let loss_val: f32 = loss.into_scalar().elem();

            metrics.update(loss_val);
        }

        metrics
    }
}

/// Progress is logged on the first epoch and every `log_every` epochs after it
fn should_log(epoch: usize, log_every: usize) -> bool {
    epoch % log_every.max(1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ChangeSample;
    use crate::features::change::{INPUT_DIM, OUTPUT_DIM};
    use crate::model::network::ChangeNetworkConfig;
    use crate::Config;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn synthetic_dataset(n: usize) -> ChangeDataset {
        let samples = (0..n)
            .map(|i| {
                let x = (i as f32 / n as f32) * 2.0 - 1.0;
                ChangeSample {
                    input: [x; INPUT_DIM],
                    target: [0.5 * x; OUTPUT_DIM],
                }
            })
            .collect();
        ChangeDataset::from_samples(samples)
    }

    fn small_config(epochs: usize) -> NetworkConfig {
        NetworkConfig {
            epochs,
            log_every: 1,
            ..Config::default().network
        }
    }

    #[test]
    fn test_smooth_l1_matches_closed_form() {
        let device = Default::default();
        let predictions = Tensor::<TestBackend, 2>::from_floats([[0.5, -2.0]], &device);
        let targets = Tensor::<TestBackend, 2>::zeros([1, 2], &device);

        let loss: f32 = SmoothL1Loss::default()
            .forward(predictions, targets)
            .into_scalar()
            .elem();

        // 0.5 * 0.25 = 0.125 and 2.0 - 0.5 = 1.5
        assert!((loss - 0.8125).abs() < 1e-6);
    }

    #[test]
    fn test_step_decay() {
        let schedule = StepDecay {
            base: 1e-3,
            step_size: 100,
            gamma: 0.5,
        };
        assert_eq!(schedule.learning_rate(0), 1e-3);
        assert_eq!(schedule.learning_rate(99), 1e-3);
        assert_eq!(schedule.learning_rate(100), 5e-4);
        assert_eq!(schedule.learning_rate(250), 2.5e-4);
    }

    #[test]
    fn test_train_records_history_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("best_model");
        let device = Default::default();

        let model = ChangeNetwork::<TestAutodiffBackend>::new(&device, &ChangeNetworkConfig::default());
        let (train, val) = synthetic_dataset(50).random_split(0.8, 42);

        let trainer = NetworkTrainer::new(model, small_config(3), device).with_checkpoint(checkpoint.clone());
        let (best, history) = trainer.train(train, val).unwrap();

        assert_eq!(history.epochs(), 3);
        assert!(history.train_losses.iter().all(|l| l.is_finite()));
        assert!(history.val_losses.iter().all(|l| l.is_finite()));
        assert!(history.best_val_loss.is_finite());
        assert!(checkpoint.with_extension("mpk").exists());

        let restored = ChangeNetwork::<TestBackend>::load(&device, &checkpoint, &ChangeNetworkConfig::default()).unwrap();
        let input = Tensor::<TestBackend, 2>::from_floats([[0.3; INPUT_DIM], [-0.6; INPUT_DIM]], &device);
        let expected = best.valid().forward(input.clone()).into_data().to_vec::<f32>().unwrap();
        let actual = restored.forward(input).into_data().to_vec::<f32>().unwrap();

        assert_eq!(expected.len(), 2 * OUTPUT_DIM);
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-5, "returned {} vs checkpoint {}", e, a);
        }
    }

    #[test]
    fn test_incomplete_batches_are_skipped() {
        let device = Default::default();
        let config = NetworkConfig {
            batch_size: 8,
            ..small_config(1)
        };
        let model = ChangeNetwork::<TestAutodiffBackend>::new(&device, &ChangeNetworkConfig::default());
        let mut trainer = NetworkTrainer::new(model, config, device);

        let train_loader = DataLoaderBuilder::new(ChangeBatcher::<TestAutodiffBackend>::new(device))
            .batch_size(8)
            .shuffle(42)
            .build(synthetic_dataset(10));
        let val_loader = DataLoaderBuilder::new(ChangeBatcher::<TestBackend>::new(device))
            .batch_size(8)
            .build(synthetic_dataset(10));

        for _ in 0..2 {
            let train_metrics = trainer.train_epoch(train_loader.iter(), 1e-3);
            assert_eq!(train_metrics.batch_count, 1);
            assert!(train_metrics.avg_loss().is_finite());

            let val_metrics = trainer.validate_epoch(val_loader.iter());
            assert_eq!(val_metrics.batch_count, 1);
        }
    }

    #[test]
    fn test_should_log_from_first_epoch() {
        let logged: Vec<usize> = (0..120).filter(|e| should_log(*e, 50)).collect();
        assert_eq!(logged, vec![0, 50, 100]);
        assert!(!should_log(49, 50));
        assert!(should_log(7, 0));
    }

    #[test]
    fn test_validation_smaller_than_batch() {
        let device = Default::default();
        let model = ChangeNetwork::<TestAutodiffBackend>::new(&device, &ChangeNetworkConfig::default());
        let (train, val) = synthetic_dataset(20).random_split(0.8, 42);
        assert_eq!(val.len(), 4);

        let result = NetworkTrainer::new(model, small_config(1), device).train(train, val);
        assert!(matches!(result, Err(BodyError::EmptyDataset(_))));
    }
}
