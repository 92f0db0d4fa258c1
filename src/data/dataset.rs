//! Burn Dataset implementation for the change network
//!
//! Provides scaled (input, target) pairs and batches them into tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::change::{INPUT_DIM, OUTPUT_DIM};

/// A single scaled training pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeSample {
    pub input: [f32; INPUT_DIM],
    pub target: [f32; OUTPUT_DIM],
}

/// In-memory dataset of change samples
#[derive(Debug, Clone, Default)]
pub struct ChangeDataset {
    samples: Vec<ChangeSample>,
}

impl ChangeDataset {
    pub fn from_samples(samples: Vec<ChangeSample>) -> Self {
        ChangeDataset { samples }
    }

    /// Build samples from already-scaled rows
    pub fn from_rows(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Self {
        let samples = inputs
            .iter()
            .zip(targets.iter())
            .map(|(x, y)| {
                let mut input = [0.0f32; INPUT_DIM];
                let mut target = [0.0f32; OUTPUT_DIM];
                for (dst, src) in input.iter_mut().zip(x.iter()) {
                    *dst = *src as f32;
                }
                for (dst, src) in target.iter_mut().zip(y.iter()) {
                    *dst = *src as f32;
                }
                ChangeSample { input, target }
            })
            .collect();
        ChangeDataset { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Shuffle pairs with a seed and split into train/validation.
    ///
    /// The training part has `floor(n * train_ratio)` samples. Inputs and
    /// targets move together, so every pair stays aligned.
    pub fn random_split(self, train_ratio: f64, seed: u64) -> (Self, Self) {
        let mut samples = self.samples;
        let n_train = (samples.len() as f64 * train_ratio) as usize;

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let val_samples = samples.split_off(n_train.min(samples.len()));
        (
            ChangeDataset { samples },
            ChangeDataset {
                samples: val_samples,
            },
        )
    }
}

impl Dataset<ChangeSample> for ChangeDataset {
    fn get(&self, index: usize) -> Option<ChangeSample> {
        self.samples.get(index).copied()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of change samples
#[derive(Debug, Clone)]
pub struct ChangeBatch<B: Backend> {
    /// Scaled inputs: [batch, INPUT_DIM]
    pub inputs: Tensor<B, 2>,
    /// Scaled relative-change targets: [batch, OUTPUT_DIM]
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct ChangeBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ChangeBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        ChangeBatcher { device }
    }
}

impl<B: Backend> Batcher<B, ChangeSample, ChangeBatch<B>> for ChangeBatcher<B> {
    fn batch(&self, items: Vec<ChangeSample>, _device: &B::Device) -> ChangeBatch<B> {
        let device = &self.device;
        let batch_size = items.len();

        let mut input_data = Vec::with_capacity(batch_size * INPUT_DIM);
        let mut target_data = Vec::with_capacity(batch_size * OUTPUT_DIM);
        for sample in &items {
            input_data.extend_from_slice(&sample.input);
            target_data.extend_from_slice(&sample.target);
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), device)
            .reshape([batch_size, INPUT_DIM]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), device)
            .reshape([batch_size, OUTPUT_DIM]);

        ChangeBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn make_dataset(n: usize) -> ChangeDataset {
        let samples = (0..n)
            .map(|i| ChangeSample {
                input: [i as f32; INPUT_DIM],
                target: [i as f32 * 10.0; OUTPUT_DIM],
            })
            .collect();
        ChangeDataset::from_samples(samples)
    }

    #[test]
    fn test_random_split_sizes() {
        let (train, val) = make_dataset(10).random_split(0.8, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);

        let (train, val) = make_dataset(7).random_split(0.8, 42);
        assert_eq!(train.len(), 5);
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn test_random_split_keeps_pairs_aligned() {
        let (train, val) = make_dataset(20).random_split(0.8, 7);
        for i in 0..train.len() {
            let s = train.get(i).unwrap();
            assert_eq!(s.target[0], s.input[0] * 10.0);
        }
        for i in 0..val.len() {
            let s = val.get(i).unwrap();
            assert_eq!(s.target[0], s.input[0] * 10.0);
        }
    }

    #[test]
    fn test_random_split_is_deterministic() {
        let (a, _) = make_dataset(20).random_split(0.8, 42);
        let (b, _) = make_dataset(20).random_split(0.8, 42);
        for i in 0..a.len() {
            assert_eq!(a.get(i), b.get(i));
        }
    }

    #[test]
    fn test_from_rows_converts_to_f32() {
        let inputs = vec![vec![1.5f64; INPUT_DIM]];
        let targets = vec![vec![-0.25f64; OUTPUT_DIM]];
        let dataset = ChangeDataset::from_rows(&inputs, &targets);

        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.input[INPUT_DIM - 1], 1.5);
        assert_eq!(sample.target[0], -0.25);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let dataset = make_dataset(3);
        let items: Vec<_> = (0..3).filter_map(|i| dataset.get(i)).collect();

        let batcher = ChangeBatcher::<TestBackend>::new(device);
        let batch = batcher.batch(items, &device);

        assert_eq!(batch.inputs.dims(), [3, INPUT_DIM]);
        assert_eq!(batch.targets.dims(), [3, OUTPUT_DIM]);

        let targets = batch.targets.into_data();
        let values: &[f32] = targets.as_slice().unwrap();
        assert_eq!(values[OUTPUT_DIM], 10.0);
    }
}
