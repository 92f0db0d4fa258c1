//! Model inference for predictions

use std::path::Path;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::Serialize;

use crate::features::change::{input_row, INPUT_DIM, OUTPUT_DIM, OUTPUT_MEASUREMENTS};
use crate::features::StandardScaler;
use crate::model::network::{ChangeNetwork, ChangeNetworkConfig};
use crate::training::network_trainer::{CHECKPOINT_NAME, INPUT_SCALER_FILE, OUTPUT_SCALER_FILE};
use crate::training::regression::RegressionModels;
use crate::{BodyError, BodyRecord, Measurement, Result};

/// A predicted measurement
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementPrediction {
    pub measurement: Measurement,
    pub value_cm: f64,
}

/// Predicts the six regression targets from height and weight
pub struct MeasurementPredictor {
    models: RegressionModels,
}

impl MeasurementPredictor {
    pub fn new(models: RegressionModels) -> Self {
        MeasurementPredictor { models }
    }

    /// Load models written by the regression trainer
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RegressionModels::load(dir)?))
    }

    pub fn predict(&self, height_cm: f64, weight_kg: f64) -> Result<Vec<MeasurementPrediction>> {
        check_positive("height", height_cm)?;
        check_positive("weight", weight_kg)?;

        Ok(self
            .models
            .predict(height_cm, weight_kg)
            .into_iter()
            .map(|(measurement, value_cm)| MeasurementPrediction {
                measurement,
                value_cm,
            })
            .collect())
    }
}

/// Projected value of one measurement at a new weight
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub measurement: Measurement,
    pub current_cm: f64,
    pub relative_change: f64,
    pub projected_cm: f64,
}

/// Applies the change network to a subject at a hypothetical weight
pub struct ChangeProjector<B: Backend> {
    model: ChangeNetwork<B>,
    input_scaler: StandardScaler,
    output_scaler: StandardScaler,
    device: B::Device,
}

impl<B: Backend> ChangeProjector<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(
        model: ChangeNetwork<B>,
        input_scaler: StandardScaler,
        output_scaler: StandardScaler,
        device: B::Device,
    ) -> Result<Self> {
        if input_scaler.dim() != INPUT_DIM || output_scaler.dim() != OUTPUT_DIM {
            return Err(BodyError::Model(format!(
                "scaler dimensions {}/{} do not match network {}/{}",
                input_scaler.dim(),
                output_scaler.dim(),
                INPUT_DIM,
                OUTPUT_DIM
            )));
        }
        Ok(ChangeProjector {
            model,
            input_scaler,
            output_scaler,
            device,
        })
    }

    /// Load the checkpoint and both scalers from `dir`
    pub fn load(dir: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let dir = dir.as_ref();
        let input_scaler = StandardScaler::load(dir.join(INPUT_SCALER_FILE))?;
        let output_scaler = StandardScaler::load(dir.join(OUTPUT_SCALER_FILE))?;
        let model = ChangeNetwork::load(&device, dir.join(CHECKPOINT_NAME), &ChangeNetworkConfig::default())?;

        log::debug!("Loaded change network from {}", dir.display());
        Self::new(model, input_scaler, output_scaler, device)
    }

    /// Relative change of each output measurement, unscaled
    pub fn relative_changes(&self, record: &BodyRecord, new_weight: f64) -> Result<[f64; OUTPUT_DIM]> {
        check_positive("new weight", new_weight)?;
        if let Some(height) = record.height_cm {
            check_positive("height", height)?;
        }
        if let Some(weight) = record.weight_kg {
            check_positive("weight", weight)?;
        }
        let row = input_row(record, new_weight).ok_or_else(|| {
            BodyError::Parse(format!(
                "subject {} is missing height, weight or a measurement",
                record.subject_id
            ))
        })?;

        let scaled: Vec<f32> = self
            .input_scaler
            .transform_row(&row)
            .into_iter()
            .map(|v| v as f32)
            .collect();
        let input = Tensor::<B, 1>::from_floats(scaled.as_slice(), &self.device).reshape([1, INPUT_DIM]);

        let output = self.model.forward(input).into_data();
        let output: Vec<f64> = output
            .to_vec::<f32>()
            .map_err(|e| BodyError::Model(format!("{:?}", e)))?
            .into_iter()
            .map(f64::from)
            .collect();

        let mut changes = [0.0; OUTPUT_DIM];
        for (slot, value) in changes
            .iter_mut()
            .zip(self.output_scaler.inverse_transform_row(&output))
        {
            *slot = value;
        }
        Ok(changes)
    }

    /// Project each output measurement to `m * (1 + change)`
    pub fn project(&self, record: &BodyRecord, new_weight: f64) -> Result<Vec<Projection>> {
        let changes = self.relative_changes(record, new_weight)?;

        OUTPUT_MEASUREMENTS
            .iter()
            .zip(changes.iter())
            .map(|(m, change)| {
                let current = record
                    .measurement(*m)
                    .ok_or_else(|| BodyError::Parse(format!("missing {}", m)))?;
                Ok(Projection {
                    measurement: *m,
                    current_cm: current,
                    relative_change: *change,
                    projected_cm: current * (1.0 + change),
                })
            })
            .collect()
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BodyError::Parse(format!("{} must be a positive number, got {}", name, value)))
    }
}
