//! Fire-and-forget sample recording.
//!
//! Recording happens once per tick during data collection and must never stall the tick
//! loop. Store failures are logged and counted, never propagated into sensing.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::sensor::Reading;
use crate::steering::SteeringLabel;
use crate::store::{RayTrace, RunId, RunRecord, Sample, SampleRecord, SampleStore, StoreError};

/// A fine-fan ray captured for telemetry: offset from heading and raw distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracedRay {
    pub theta: f64,
    pub distance: f64,
}

/// Sink for per-tick samples.
pub trait Recorder {
    fn run_id(&self) -> RunId;

    /// Records `reading` with the label active when it was sensed, plus optional telemetry.
    fn record_traced(&mut self, reading: Reading, label: SteeringLabel, rays: Vec<TracedRay>);

    fn record(&mut self, reading: Reading, label: SteeringLabel) {
        self.record_traced(reading, label, Vec::new());
    }
}

fn write_sample<S: SampleStore + ?Sized>(
    store: &S,
    run_id: RunId,
    sample: &Sample,
    rays: &[TracedRay],
) -> Result<u64, StoreError> {
    let seq = store.append_sample(&SampleRecord::new(run_id, sample))?;
    if !rays.is_empty() {
        let traces: Vec<RayTrace> = rays
            .iter()
            .map(|ray| RayTrace {
                run_id,
                sample_seq: seq,
                theta: ray.theta,
                distance: ray.distance,
            })
            .collect();
        store.append_traces(&traces)?;
    }
    Ok(seq)
}

/// Writes each sample straight into the store on the calling thread.
#[derive(Debug)]
pub struct SampleRecorder<S> {
    store: S,
    run: RunRecord,
    written: usize,
    failures: usize,
}

impl<S: SampleStore> SampleRecorder<S> {
    /// Starts a new run in `store`.
    pub fn begin(store: S) -> Result<Self, StoreError> {
        let run = store.begin_run()?;
        Ok(Self::for_run(store, run))
    }

    pub fn for_run(store: S, run: RunRecord) -> Self {
        Self {
            store,
            run,
            written: 0,
            failures: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SampleStore> Recorder for SampleRecorder<S> {
    fn run_id(&self) -> RunId {
        self.run.run_id
    }

    fn record_traced(&mut self, reading: Reading, label: SteeringLabel, rays: Vec<TracedRay>) {
        let sample = Sample::new(reading, label);
        match write_sample(&self.store, self.run.run_id, &sample, &rays) {
            Ok(seq) => {
                self.written += 1;
                debug!(run_id = self.run.run_id, seq, %label, "sample recorded");
            }
            Err(err) => {
                self.failures += 1;
                warn!(run_id = self.run.run_id, %err, "failed to record sample");
            }
        }
    }
}

struct Job {
    sample: Sample,
    rays: Vec<TracedRay>,
}

/// Totals reported by the background writer when its queue closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub written: usize,
    pub failed: usize,
}

/// Queues samples for a background writer so `record` never touches the store.
#[derive(Debug)]
pub struct QueuedRecorder {
    run_id: RunId,
    tx: mpsc::UnboundedSender<Job>,
    dropped: usize,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.sample.label)
            .field("rays", &self.rays.len())
            .finish()
    }
}

impl QueuedRecorder {
    /// Spawns the writer on tokio's blocking pool. Must be called inside a runtime.
    ///
    /// The writer drains the queue until every `QueuedRecorder` handle is dropped and then
    /// resolves to a [`WriterReport`].
    pub fn spawn<S>(store: S, run: RunRecord) -> (Self, JoinHandle<WriterReport>)
    where
        S: SampleStore + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let run_id = run.run_id;
        let writer = tokio::task::spawn_blocking(move || {
            let mut report = WriterReport::default();
            while let Some(job) = rx.blocking_recv() {
                match write_sample(&store, run_id, &job.sample, &job.rays) {
                    Ok(_) => report.written += 1,
                    Err(err) => {
                        report.failed += 1;
                        warn!(run_id, %err, "background sample write failed");
                    }
                }
            }
            debug!(run_id, written = report.written, failed = report.failed, "sample writer finished");
            report
        });
        (
            Self {
                run_id,
                tx,
                dropped: 0,
            },
            writer,
        )
    }

    /// Samples that could not be queued because the writer was gone.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Like [`Recorder::record`] but reports a closed queue to the caller.
    pub fn try_record(&self, reading: Reading, label: SteeringLabel) -> Result<(), StoreError> {
        self.tx
            .send(Job {
                sample: Sample::new(reading, label),
                rays: Vec::new(),
            })
            .map_err(|_| StoreError::Closed)
    }
}

impl Recorder for QueuedRecorder {
    fn run_id(&self) -> RunId {
        self.run_id
    }

    fn record_traced(&mut self, reading: Reading, label: SteeringLabel, rays: Vec<TracedRay>) {
        let job = Job {
            sample: Sample::new(reading, label),
            rays,
        };
        if self.tx.send(job).is_err() {
            self.dropped += 1;
            warn!(run_id = self.run_id, "sample writer closed; dropping sample");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySampleStore;

    /// Store whose sample appends always fail.
    struct BrokenStore;

    impl SampleStore for BrokenStore {
        fn begin_run(&self) -> Result<RunRecord, StoreError> {
            Ok(RunRecord {
                run_id: 1,
                started_at: 0,
            })
        }

        fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn append_sample(&self, _record: &SampleRecord) -> Result<u64, StoreError> {
            Err(StoreError::Closed)
        }

        fn samples(&self) -> Result<Vec<SampleRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn append_traces(&self, _traces: &[RayTrace]) -> Result<(), StoreError> {
            Err(StoreError::Closed)
        }

        fn traces(&self) -> Result<Vec<RayTrace>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn sync_recorder_tags_samples_with_run() {
        let store = MemorySampleStore::new();
        let mut recorder = SampleRecorder::begin(store.clone()).unwrap();
        recorder.record(Reading::new(vec![0.1, 0.2]), SteeringLabel::Left);
        recorder.record_traced(
            Reading::new(vec![0.3, 0.4]),
            SteeringLabel::None,
            vec![TracedRay {
                theta: 0.0,
                distance: 3.0,
            }],
        );

        let samples = store.samples().unwrap();
        assert_eq!(recorder.written(), 2);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.run_id == recorder.run_id()));
        assert_eq!(samples[0].to_sample().unwrap().label, SteeringLabel::Left);
        assert_eq!(store.traces().unwrap().len(), 1);
    }

    #[test]
    fn store_failures_are_counted_not_raised() {
        let mut recorder = SampleRecorder::begin(BrokenStore).unwrap();
        recorder.record(Reading::new(vec![1.0]), SteeringLabel::Right);
        recorder.record(Reading::new(vec![1.0]), SteeringLabel::Right);
        assert_eq!(recorder.written(), 0);
        assert_eq!(recorder.failures(), 2);
    }

    #[tokio::test]
    async fn queued_recorder_drains_on_close() {
        let store = MemorySampleStore::new();
        let run = store.begin_run().unwrap();
        let (mut recorder, writer) = QueuedRecorder::spawn(store.clone(), run);

        for i in 0..50 {
            let label = if i % 2 == 0 {
                SteeringLabel::Left
            } else {
                SteeringLabel::None
            };
            recorder.record(Reading::new(vec![f64::from(i), 1.0]), label);
        }
        drop(recorder);

        let report = writer.await.unwrap();
        assert_eq!(report, WriterReport { written: 50, failed: 0 });
        let samples = store.samples().unwrap();
        assert_eq!(samples.len(), 50);
        assert_eq!(samples[49].reading[0], 49.0);
    }

    #[tokio::test]
    async fn queued_recorder_reports_write_failures() {
        let run = BrokenStore.begin_run().unwrap();
        let (recorder, writer) = QueuedRecorder::spawn(BrokenStore, run);
        recorder.try_record(Reading::new(vec![1.0]), SteeringLabel::None).unwrap();
        drop(recorder);
        assert_eq!(writer.await.unwrap(), WriterReport { written: 0, failed: 1 });
    }
}
