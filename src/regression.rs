//! Ordinary least squares fit of one linear model per steering label.
//!
//! Every label shares the same design matrix (one row per sample, one column per sensor)
//! and regresses its own `{0,1}` indicator column. The fit is a one-shot batch solve
//! through the SVD of the design matrix, so identical samples always yield identical
//! coefficients.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::steering::SteeringLabel;
use crate::store::Sample;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrainingError {
    #[error("no training samples")]
    Empty,
    #[error("training readings carry no sensor values")]
    NoSensors,
    #[error("insufficient training data: {samples} samples for {parameters} parameters")]
    Insufficient { samples: usize, parameters: usize },
    #[error("ill-conditioned training data: design matrix rank {rank} < {parameters} parameters")]
    RankDeficient { rank: usize, parameters: usize },
    #[error("sample {row} has {found} sensor values, expected {expected}")]
    InconsistentSensorCount {
        expected: usize,
        found: usize,
        row: usize,
    },
    #[error("sample {row} contains a non-finite sensor value")]
    NonFinite { row: usize },
    #[error("least squares solve failed: {0}")]
    Solver(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrainerOptions {
    /// Fit a constant term next to the sensor coefficients.
    #[serde(default)]
    pub intercept: bool,
}

/// Linear model scoring how strongly a reading indicates one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub label: SteeringLabel,
    /// One coefficient per sensor offset, in fan order.
    pub coefficients: Vec<f64>,
    /// Constant term; 0 unless the model was trained with an intercept.
    pub intercept: f64,
}

impl RegressionModel {
    pub fn score(&self, reading: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(reading)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// The three per-label models produced by one training pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteeringModels {
    pub left: RegressionModel,
    pub right: RegressionModel,
    pub none: RegressionModel,
}

impl SteeringModels {
    pub fn get(&self, label: SteeringLabel) -> &RegressionModel {
        match label {
            SteeringLabel::Left => &self.left,
            SteeringLabel::Right => &self.right,
            SteeringLabel::None => &self.none,
        }
    }

    /// Number of sensor coefficients shared by all three models.
    pub fn sensor_count(&self) -> usize {
        self.left.coefficients.len()
    }
}

fn design_matrix(samples: &[Sample], intercept: bool) -> Result<DMatrix<f64>, TrainingError> {
    let sensors = samples[0].reading.len();
    if sensors == 0 {
        return Err(TrainingError::NoSensors);
    }
    for (row, sample) in samples.iter().enumerate() {
        let values = sample.reading.values();
        if values.len() != sensors {
            return Err(TrainingError::InconsistentSensorCount {
                expected: sensors,
                found: values.len(),
                row,
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite { row });
        }
    }

    let offset = usize::from(intercept);
    Ok(DMatrix::from_fn(samples.len(), sensors + offset, |r, c| {
        if c < offset {
            1.0
        } else {
            samples[r].reading.values()[c - offset]
        }
    }))
}

/// Trains without an intercept.
pub fn train(samples: &[Sample]) -> Result<SteeringModels, TrainingError> {
    train_with(samples, TrainerOptions::default())
}

#[tracing::instrument(level = "info", skip(samples), fields(samples = samples.len()))]
pub fn train_with(samples: &[Sample], options: TrainerOptions) -> Result<SteeringModels, TrainingError> {
    if samples.is_empty() {
        return Err(TrainingError::Empty);
    }

    let x = design_matrix(samples, options.intercept)?;
    let (rows, parameters) = x.shape();
    if rows < parameters {
        return Err(TrainingError::Insufficient {
            samples: rows,
            parameters,
        });
    }

    let svd = x.svd(true, true);
    let largest = svd.singular_values.max();
    let tolerance = f64::EPSILON * rows.max(parameters) as f64 * largest;
    let rank = svd.rank(tolerance);
    if rank < parameters {
        return Err(TrainingError::RankDeficient { rank, parameters });
    }

    let fit = |label: SteeringLabel| -> Result<RegressionModel, TrainingError> {
        let y = DVector::from_iterator(rows, samples.iter().map(|s| label.indicator(s.label)));
        let beta = svd.solve(&y, tolerance).map_err(TrainingError::Solver)?;
        let (intercept, coefficients): (f64, Vec<f64>) = if options.intercept {
            (beta[0], beta.iter().skip(1).copied().collect())
        } else {
            (0.0, beta.iter().copied().collect())
        };
        debug!(%label, ?coefficients, intercept, "fitted steering model");
        Ok(RegressionModel {
            label,
            coefficients,
            intercept,
        })
    };

    let models = SteeringModels {
        left: fit(SteeringLabel::Left)?,
        right: fit(SteeringLabel::Right)?,
        none: fit(SteeringLabel::None)?,
    };
    info!(rank, parameters, "trained steering models");
    Ok(models)
}
