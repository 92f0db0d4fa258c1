//! Synthetic weight change and relative-change targets
//!
//! Each subject gets a hypothetical `new_weight` drawn around their current
//! weight; targets are the relative change of eleven measurements under
//! proportional scaling by `new_weight / weight_kg`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BodyError, BodyRecord, Measurement, Result};

/// Network input: all measurements, height_cm, weight_kg, new_weight
pub const INPUT_DIM: usize = Measurement::COUNT + 3;

/// Measurements whose relative change the network predicts
pub const OUTPUT_MEASUREMENTS: [Measurement; 11] = [
    Measurement::Ankle,
    Measurement::Bicep,
    Measurement::Calf,
    Measurement::Chest,
    Measurement::Forearm,
    Measurement::Hip,
    Measurement::ShoulderBreadth,
    Measurement::ShoulderToCrotch,
    Measurement::Thigh,
    Measurement::Waist,
    Measurement::Wrist,
];

pub const OUTPUT_DIM: usize = OUTPUT_MEASUREMENTS.len();

/// Uniform multiplicative weight perturbation
#[derive(Debug, Clone, Copy)]
pub struct WeightPerturbation {
    pub low: f64,
    pub high: f64,
}

impl Default for WeightPerturbation {
    fn default() -> Self {
        WeightPerturbation {
            low: 0.9,
            high: 1.1,
        }
    }
}

impl WeightPerturbation {
    pub fn sample<R: Rng>(&self, rng: &mut R, weight_kg: f64) -> f64 {
        weight_kg * rng.gen_range(self.low..self.high)
    }
}

/// Relative change `(m * new/old - m) / m` for each output measurement.
///
/// Returns `None` when a measurement is missing or zero, or weight is not positive.
pub fn change_targets(record: &BodyRecord, new_weight: f64) -> Option<[f64; OUTPUT_DIM]> {
    let weight = record.weight_kg.filter(|w| *w > 0.0)?;
    let ratio = new_weight / weight;

    let mut targets = [0.0; OUTPUT_DIM];
    for (slot, m) in targets.iter_mut().zip(OUTPUT_MEASUREMENTS.iter()) {
        let value = record.measurement(*m).filter(|v| *v != 0.0)?;
        *slot = (value * ratio - value) / value;
    }
    Some(targets)
}

/// Network input row for a subject at a hypothetical weight
pub fn input_row(record: &BodyRecord, new_weight: f64) -> Option<[f64; INPUT_DIM]> {
    let mut row = [0.0; INPUT_DIM];
    for (slot, value) in row.iter_mut().zip(record.measurements.iter()) {
        *slot = (*value)?;
    }
    row[Measurement::COUNT] = record.height_cm?;
    row[Measurement::COUNT + 1] = record.weight_kg?;
    row[Measurement::COUNT + 2] = new_weight;
    Some(row)
}

/// Unscaled inputs and targets for the change network
#[derive(Debug, Clone, Default)]
pub struct ChangeTable {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<Vec<f64>>,
}

impl ChangeTable {
    /// Keep complete male subjects and derive a perturbed weight per row
    pub fn from_records(
        records: &[BodyRecord],
        perturbation: WeightPerturbation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table = ChangeTable::default();
        let mut dropped = 0usize;

        for record in records.iter().filter(|r| r.is_male()) {
            let Some(weight) = record.weight_kg else {
                dropped += 1;
                continue;
            };
            let new_weight = perturbation.sample(&mut rng, weight);

            match (input_row(record, new_weight), change_targets(record, new_weight)) {
                (Some(input), Some(target)) => {
                    table.inputs.push(input.to_vec());
                    table.targets.push(target.to_vec());
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            log::warn!("Dropped {} male rows with missing or zero values", dropped);
        }
        if table.inputs.is_empty() {
            return Err(BodyError::EmptyDataset(
                "no usable male rows for the change network".to_string(),
            ));
        }

        log::info!("Built {} change samples", table.inputs.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
