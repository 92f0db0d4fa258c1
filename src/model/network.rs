//! Feed-forward network predicting relative measurement change
//!
//! Architecture: Input(17) → Linear(256) → BatchNorm → ReLU → Dropout
//!                         → Linear(128) → BatchNorm → ReLU
//!                         → Linear(64)  → ReLU
//!                         → Linear(11)

use std::path::Path;

use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::features::change::{INPUT_DIM, OUTPUT_DIM};
use crate::{BodyError, Result};

/// Configuration for the change network
#[derive(Debug, Clone)]
pub struct ChangeNetworkConfig {
    pub input_dim: usize,
    pub output_dim: usize,
    /// Widths of the three hidden layers
    pub hidden_dims: [usize; 3],
    pub dropout: f64,
}

impl Default for ChangeNetworkConfig {
    fn default() -> Self {
        ChangeNetworkConfig {
            input_dim: INPUT_DIM,
            output_dim: OUTPUT_DIM,
            hidden_dims: [256, 128, 64],
            dropout: 0.3,
        }
    }
}

impl ChangeNetworkConfig {
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }
}

/// Dense network with batch normalization on the first two hidden layers
#[derive(Module, Debug)]
pub struct ChangeNetwork<B: Backend> {
    fc1: Linear<B>,
    bn1: BatchNorm<B, 1>,
    fc2: Linear<B>,
    bn2: BatchNorm<B, 1>,
    fc3: Linear<B>,
    fc4: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> ChangeNetwork<B> {
    pub fn new(device: &B::Device, config: &ChangeNetworkConfig) -> Self {
        let [h1, h2, h3] = config.hidden_dims;
        ChangeNetwork {
            fc1: LinearConfig::new(config.input_dim, h1).init(device),
            bn1: BatchNormConfig::new(h1).init(device),
            fc2: LinearConfig::new(h1, h2).init(device),
            bn2: BatchNormConfig::new(h2).init(device),
            fc3: LinearConfig::new(h2, h3).init(device),
            fc4: LinearConfig::new(h3, config.output_dim).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Scaled inputs [batch, input_dim]
    ///
    /// # Returns
    /// Scaled relative changes [batch, output_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(Self::normalize(&self.bn1, self.fc1.forward(x)));
        let x = self.dropout.forward(x);
        let x = relu(Self::normalize(&self.bn2, self.fc2.forward(x)));
        let x = relu(self.fc3.forward(x));
        self.fc4.forward(x)
    }

    /// Batch-normalize [batch, features] as [batch, features, 1]
    fn normalize(bn: &BatchNorm<B, 1>, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, features] = x.dims();
        bn.forward(x.reshape([batch, features, 1]))
            .reshape([batch, features])
    }

    /// Save weights; the recorder appends `.mpk` to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.as_ref().to_path_buf())
            .map_err(|e| BodyError::Model(format!("failed to save checkpoint: {}", e)))
    }

    /// Load weights saved by `save`
    pub fn load(device: &B::Device, path: impl AsRef<Path>, config: &ChangeNetworkConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let path = path.as_ref();
        let file = path.with_extension("mpk");
        if !file.exists() {
            return Err(BodyError::NoModel(file.display().to_string()));
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.to_path_buf(), device)
            .map_err(|e| BodyError::Model(format!("failed to load checkpoint: {}", e)))?;

        Ok(Self::new(device, config).load_record(record))
    }
}
