//! Append-only persistence for runs, samples and ray telemetry.
//!
//! The core never depends on a storage engine directly; it talks to [`SampleStore`].
//! Two engines ship with the crate: [`SledSampleStore`] (embedded DB, one tree per record
//! kind) and [`MemorySampleStore`] (process-local, used by tests and dry runs).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sensor::Reading;
use crate::steering::{OneHot, SteeringLabel};

/// Default on-disk location of the sample database.
pub const SAMPLE_STORE_PATH: &str = "raycar_samples";

const RUNS_TREE: &str = "runs";
const SAMPLES_TREE: &str = "samples";
const RAYS_TREE: &str = "rays";

/// Opaque identifier grouping the samples of one data-collection session.
pub type RunId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sample store: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to encode or decode a stored record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("stored record under key {key:?} is not a valid sample")]
    Corrupt { key: String },
    #[error("background sample writer has shut down")]
    Closed,
}

/// A sensor reading paired with the steering label active when it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub reading: Reading,
    pub label: SteeringLabel,
}

impl Sample {
    pub fn new(reading: Reading, label: SteeringLabel) -> Self {
        Self { reading, label }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Unix seconds.
    pub started_at: u64,
}

/// Stored form of a [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub run_id: RunId,
    /// Unix seconds.
    pub recorded_at: u64,
    /// Length of the sensor fan that produced `reading`.
    pub sensor_count: usize,
    pub reading: Vec<f64>,
    #[serde(flatten)]
    pub label: OneHot,
}

impl SampleRecord {
    pub fn new(run_id: RunId, sample: &Sample) -> Self {
        Self {
            run_id,
            recorded_at: unix_now(),
            sensor_count: sample.reading.len(),
            reading: sample.reading.values().to_vec(),
            label: sample.label.one_hot(),
        }
    }

    /// Decodes the record, or `None` if its label triple is not one-hot.
    pub fn to_sample(&self) -> Option<Sample> {
        let label = self.label.label()?;
        Some(Sample::new(Reading::new(self.reading.clone()), label))
    }
}

/// One fine-fan ray logged alongside a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayTrace {
    pub run_id: RunId,
    pub sample_seq: u64,
    /// Offset from the heading, in radians.
    pub theta: f64,
    /// Raw distance in pixels.
    pub distance: f64,
}

/// Structured record sink with bulk read-back.
///
/// Appends are single-writer and never update or delete earlier records.
pub trait SampleStore {
    /// Registers a new data-collection run.
    fn begin_run(&self) -> Result<RunRecord, StoreError>;

    /// All runs, oldest first.
    fn runs(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Appends a sample and returns its sequence number.
    fn append_sample(&self, record: &SampleRecord) -> Result<u64, StoreError>;

    /// All samples from every run, in append order.
    fn samples(&self) -> Result<Vec<SampleRecord>, StoreError>;

    fn append_traces(&self, traces: &[RayTrace]) -> Result<(), StoreError>;

    /// All ray traces, grouped by sample in append order.
    fn traces(&self) -> Result<Vec<RayTrace>, StoreError>;
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// [`SampleStore`] backed by an embedded sled database.
#[derive(Debug, Clone)]
pub struct SledSampleStore {
    db: sled::Db,
}

impl SledSampleStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        Ok(Self::from_db(sled::open(path)?))
    }

    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn insert<T: Serialize>(&self, tree: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let tree = self.db.open_tree(tree)?;
        tree.insert(key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan<T: for<'de> Deserialize<'de>>(&self, tree: &str) -> Result<Vec<T>, StoreError> {
        let tree = self.db.open_tree(tree)?;
        tree.iter()
            .map(|entry| -> Result<T, StoreError> {
                let (_, value) = entry?;
                Ok(serde_json::from_slice::<T>(&value)?)
            })
            .collect()
    }
}

impl SampleStore for SledSampleStore {
    fn begin_run(&self) -> Result<RunRecord, StoreError> {
        let run = RunRecord {
            run_id: self.db.generate_id()?,
            started_at: unix_now(),
        };
        self.insert(RUNS_TREE, &format!("{:020}", run.run_id), &run)?;
        self.db.open_tree(RUNS_TREE)?.flush()?;
        Ok(run)
    }

    fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        self.scan(RUNS_TREE)
    }

    fn append_sample(&self, record: &SampleRecord) -> Result<u64, StoreError> {
        let seq = self.db.generate_id()?;
        // Zero-padded keys keep sled's lexicographic order equal to append order.
        self.insert(SAMPLES_TREE, &format!("{seq:020}"), record)?;
        Ok(seq)
    }

    fn samples(&self) -> Result<Vec<SampleRecord>, StoreError> {
        self.scan(SAMPLES_TREE)
    }

    fn append_traces(&self, traces: &[RayTrace]) -> Result<(), StoreError> {
        let tree = self.db.open_tree(RAYS_TREE)?;
        let mut batch = sled::Batch::default();
        for trace in traces {
            let idx = self.db.generate_id()?;
            let key = format!("{:020}_{idx:020}", trace.sample_seq);
            batch.insert(key.as_bytes(), serde_json::to_vec(trace)?);
        }
        tree.apply_batch(batch)?;
        Ok(())
    }

    fn traces(&self) -> Result<Vec<RayTrace>, StoreError> {
        self.scan(RAYS_TREE)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: u64,
    runs: Vec<RunRecord>,
    samples: Vec<SampleRecord>,
    traces: Vec<RayTrace>,
}

/// Process-local [`SampleStore`]. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut MemoryInner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl SampleStore for MemorySampleStore {
    fn begin_run(&self) -> Result<RunRecord, StoreError> {
        Ok(self.with(|inner| {
            let run = RunRecord {
                run_id: inner.next_id,
                started_at: unix_now(),
            };
            inner.next_id += 1;
            inner.runs.push(run);
            run
        }))
    }

    fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.with(|inner| inner.runs.clone()))
    }

    fn append_sample(&self, record: &SampleRecord) -> Result<u64, StoreError> {
        Ok(self.with(|inner| {
            let seq = inner.next_id;
            inner.next_id += 1;
            inner.samples.push(record.clone());
            seq
        }))
    }

    fn samples(&self) -> Result<Vec<SampleRecord>, StoreError> {
        Ok(self.with(|inner| inner.samples.clone()))
    }

    fn append_traces(&self, traces: &[RayTrace]) -> Result<(), StoreError> {
        self.with(|inner| inner.traces.extend_from_slice(traces));
        Ok(())
    }

    fn traces(&self) -> Result<Vec<RayTrace>, StoreError> {
        Ok(self.with(|inner| inner.traces.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> SledSampleStore {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        SledSampleStore::from_db(db)
    }

    fn sample(values: &[f64], label: SteeringLabel) -> Sample {
        Sample::new(Reading::new(values.to_vec()), label)
    }

    #[test]
    fn sled_store_reads_samples_back_in_append_order() {
        let store = temp_store();
        let run = store.begin_run().unwrap();
        let labels = [
            SteeringLabel::Left,
            SteeringLabel::None,
            SteeringLabel::Right,
            SteeringLabel::None,
        ];
        for (i, label) in labels.iter().enumerate() {
            let s = sample(&[i as f64, 0.5, 0.25, 0.125, 0.0625], *label);
            store.append_sample(&SampleRecord::new(run.run_id, &s)).unwrap();
        }

        let stored = store.samples().unwrap();
        assert_eq!(stored.len(), 4);
        for (i, (record, label)) in stored.iter().zip(labels).enumerate() {
            assert_eq!(record.run_id, run.run_id);
            assert_eq!(record.sensor_count, 5);
            assert_eq!(record.reading[0], i as f64);
            assert_eq!(record.to_sample().unwrap().label, label);
        }
    }

    #[test]
    fn stored_labels_are_one_hot() {
        let store = temp_store();
        let run = store.begin_run().unwrap();
        for label in SteeringLabel::ALL {
            store
                .append_sample(&SampleRecord::new(run.run_id, &sample(&[1.0], label)))
                .unwrap();
        }
        for record in store.samples().unwrap() {
            let hot = record.label;
            assert_eq!(hot.turning_left + hot.turning_right + hot.not_turning, 1);
        }
    }

    #[test]
    fn record_json_has_flat_label_fields() {
        let record = SampleRecord::new(7, &sample(&[0.5], SteeringLabel::Right));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["turning_left"], 0);
        assert_eq!(json["turning_right"], 1);
        assert_eq!(json["not_turning"], 0);
        assert_eq!(json["sensor_count"], 1);
    }

    #[test]
    fn runs_are_distinct_and_ordered() {
        let store = temp_store();
        let a = store.begin_run().unwrap();
        let b = store.begin_run().unwrap();
        assert!(b.run_id > a.run_id);
        assert_eq!(store.runs().unwrap(), vec![a, b]);
    }

    #[test]
    fn traces_group_by_sample() {
        let store = temp_store();
        let run = store.begin_run().unwrap();
        let seq = store
            .append_sample(&SampleRecord::new(run.run_id, &sample(&[1.0], SteeringLabel::None)))
            .unwrap();
        let traces: Vec<_> = [(-0.5, 12.0), (0.0, 20.0), (0.5, 9.0)]
            .into_iter()
            .map(|(theta, distance)| RayTrace {
                run_id: run.run_id,
                sample_seq: seq,
                theta,
                distance,
            })
            .collect();
        store.append_traces(&traces).unwrap();
        assert_eq!(store.traces().unwrap(), traces);
    }

    #[test]
    fn memory_store_clones_share_records() {
        let store = MemorySampleStore::new();
        let view = store.clone();
        let run = store.begin_run().unwrap();
        store
            .append_sample(&SampleRecord::new(run.run_id, &sample(&[2.0], SteeringLabel::Left)))
            .unwrap();
        assert_eq!(view.samples().unwrap().len(), 1);
        assert_eq!(view.runs().unwrap(), vec![run]);
    }
}
