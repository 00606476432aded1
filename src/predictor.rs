//! Picks a steering label from the three trained models.

use thiserror::Error;
use tracing::debug;

use crate::regression::SteeringModels;
use crate::sensor::Reading;
use crate::steering::SteeringLabel;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PredictionError {
    #[error("reading has {found} values but the models expect {expected}")]
    SensorCount { expected: usize, found: usize },
}

/// Per-label distance between the model score and the target value 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub label: SteeringLabel,
    pub left_error: f64,
    pub right_error: f64,
    pub none_error: f64,
}

/// Scores `reading` (inverse distances from the training fan) against every model and
/// selects the label whose score lands closest to 1.
///
/// LEFT or RIGHT only win when their error is strictly smaller than both others. Any
/// tie, including a three-way tie or a NaN comparison, falls back to NONE.
pub fn decide(reading: &Reading, models: &SteeringModels) -> Result<Decision, PredictionError> {
    let expected = models.sensor_count();
    if reading.len() != expected {
        return Err(PredictionError::SensorCount {
            expected,
            found: reading.len(),
        });
    }

    let error = |label| (models.get(label).score(reading.values()) - 1.0).abs();
    let left = error(SteeringLabel::Left);
    let right = error(SteeringLabel::Right);
    let none = error(SteeringLabel::None);

    let label = if left < right && left < none {
        SteeringLabel::Left
    } else if right < left && right < none {
        SteeringLabel::Right
    } else {
        SteeringLabel::None
    };

    debug!(%label, left, right, none, "steering decision");
    Ok(Decision {
        label,
        left_error: left,
        right_error: right,
        none_error: none,
    })
}

pub fn predict(reading: &Reading, models: &SteeringModels) -> Result<SteeringLabel, PredictionError> {
    decide(reading, models).map(|d| d.label)
}
