//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::predictor::PredictionError;
use crate::ray::RayError;
use crate::regression::TrainingError;
use crate::sensor::SensorError;
use crate::store::StoreError;
use crate::track::TrackError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Ray(#[from] RayError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Models trained on one sensor fan cannot drive a session using another.
    #[error("models were trained on {models} sensors but the session fan has {fan}")]
    FanMismatch { models: usize, fan: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
