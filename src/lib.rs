//! Ray-sensing vehicle simulator with a least-squares steering model.
//!
//! This crate defines:
//! - [`track::Track`]: the occupancy bitmap a vehicle drives on.
//! - [`ray::RayCaster`] and [`sensor::SensorArray`]: distance sensing against the track.
//! - [`recorder`] and [`store`]: append-only sample collection tagged by run.
//! - [`regression::train`] and [`predictor::predict`]: the per-label OLS models and the
//!   decision rule that turns their scores into a steering command.
//! - [`RaceLab`]: a handle tying a persistent sample store to training and inference
//!   sessions.

pub mod config;
pub mod error;
pub mod kinematics;
pub mod pose;
pub mod predictor;
pub mod ray;
pub mod recorder;
pub mod regression;
pub mod sensor;
pub mod session;
pub mod steering;
pub mod store;
pub mod track;

use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::LabConfig;
pub use error::{Error, Result};
pub use kinematics::{tick, Kinematics, SimulationState, SteerKey};
pub use pose::Pose;
pub use predictor::predict;
pub use ray::cast_ray;
pub use regression::{train, RegressionModel, SteeringModels};
pub use sensor::{sense, Reading, SensorOffsets};
pub use session::{InferenceSession, Stepper, TrainingSession};
pub use steering::SteeringLabel;
pub use store::{Sample, SampleStore, SledSampleStore};
pub use track::Track;

// Re-export so drivers can open or share the sample DB without depending on `sled`.
pub use sled;

use recorder::{QueuedRecorder, SampleRecorder, WriterReport};
use store::{RunRecord, StoreError};

/// Owns the persistent sample store and the configuration sessions are built from.
///
/// Samples from every run are pooled for training. The store is flushed when the lab is
/// dropped.
pub struct RaceLab {
    store: SledSampleStore,
    config: LabConfig,
}

impl Drop for RaceLab {
    fn drop(&mut self) {
        if let Err(err) = self.store.flush() {
            warn!(%err, "failed to flush sample store on drop");
        }
    }
}

impl std::fmt::Debug for RaceLab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceLab")
            .field("store_path", &self.config.store_path)
            .field("sensors", &self.config.sensors.fan)
            .field("intercept", &self.config.training.intercept)
            .finish()
    }
}

impl RaceLab {
    /// Opens (or creates) the sample store at `config.store_path`.
    pub fn new(config: LabConfig) -> Result<Self> {
        config.validate()?;
        let store = SledSampleStore::open(&config.store_path)?;
        Ok(Self { store, config })
    }

    /// Builds a lab around an already-open DB handle.
    pub fn from_db(db: sled::Db, config: LabConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: SledSampleStore::from_db(db),
            config,
        })
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn store(&self) -> &SledSampleStore {
        &self.store
    }

    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.store.runs()?)
    }

    /// Starts a new run and a session that writes each sample synchronously.
    pub fn begin_training(&self, track: Track) -> Result<TrainingSession<SampleRecorder<SledSampleStore>>> {
        let recorder = SampleRecorder::begin(self.store.clone())?;
        TrainingSession::new(track, &self.config, recorder)
    }

    /// Starts a new run whose samples are written by a background task.
    ///
    /// Must be called inside a tokio runtime. Dropping the session closes the queue; the
    /// returned handle then resolves once every queued sample is written.
    pub fn begin_queued_training(
        &self,
        track: Track,
    ) -> Result<(TrainingSession<QueuedRecorder>, JoinHandle<WriterReport>)> {
        let run = self.store.begin_run()?;
        let (recorder, writer) = QueuedRecorder::spawn(self.store.clone(), run);
        Ok((TrainingSession::new(track, &self.config, recorder)?, writer))
    }

    /// Every stored sample, from all runs, in append order.
    pub fn load_samples(&self) -> Result<Vec<Sample>> {
        let records = self.store.samples()?;
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                record
                    .to_sample()
                    .filter(|s| s.reading.len() == record.sensor_count)
                    .ok_or_else(|| {
                        Error::from(StoreError::Corrupt {
                            key: format!("run {} sample {i}", record.run_id),
                        })
                    })
            })
            .collect()
    }

    /// Fits the three steering models over every stored sample.
    #[tracing::instrument(skip(self))]
    pub fn train(&self) -> Result<SteeringModels> {
        let samples = self.load_samples()?;
        let models = regression::train_with(&samples, self.config.training)?;
        info!(samples = samples.len(), "steering models ready");
        Ok(models)
    }

    pub fn begin_inference(&self, track: Track, models: SteeringModels) -> Result<InferenceSession> {
        InferenceSession::new(track, &self.config, models)
    }
}
