//! Tick-driven data-collection and inference sessions.
//!
//! A session owns the track, its sensor fan and the current [`SimulationState`]. Each
//! `step` runs one tick: sense, then record or predict, then advance the kinematics. A
//! failed sensing pass aborts the tick and leaves the state untouched.

use std::time::Duration;

use nalgebra::Point2;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::LabConfig;
use crate::error::{Error, Result};
use crate::kinematics::{tick, Kinematics, OperatorControl, SimulationState, SteerKey};
use crate::predictor::{decide, Decision};
use crate::recorder::{Recorder, TracedRay};
use crate::regression::SteeringModels;
use crate::sensor::{Reading, ReadingForm, SensorArray, SensorOffsets};
use crate::steering::SteeringLabel;
use crate::track::Track;

/// Something that advances one tick at a time.
pub trait Stepper {
    type Output;

    fn step(&mut self) -> Result<Self::Output>;
}

/// Runs `ticks` steps paced by a tokio interval of `period`.
pub async fn drive<S: Stepper>(session: &mut S, ticks: usize, period: Duration) -> Result<Vec<S::Output>> {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outputs = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        timer.tick().await;
        outputs.push(session.step()?);
    }
    Ok(outputs)
}

fn sensor_array(config: &LabConfig, offsets: SensorOffsets) -> SensorArray {
    SensorArray::new(offsets, config.sensors.caster()).with_missing_boundary(config.sensors.missing_boundary)
}

fn ray_endpoints(sensors: &SensorArray, track: &Track, state: &SimulationState) -> Vec<Option<Point2<f64>>> {
    sensors
        .cast_all(track, &state.pose)
        .into_iter()
        .map(|(_, hit)| hit.ok().map(|h| h.end))
        .collect()
}

/// What a data-collection tick captured.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTick {
    pub reading: Reading,
    pub label: SteeringLabel,
}

/// Drives the vehicle from operator input and records one sample per tick.
#[derive(Debug)]
pub struct TrainingSession<R> {
    track: Track,
    sensors: SensorArray,
    telemetry: Option<SensorArray>,
    kinematics: Kinematics,
    state: SimulationState,
    control: OperatorControl,
    recorder: R,
    ticks: u64,
}

impl<R: Recorder> TrainingSession<R> {
    pub fn new(track: Track, config: &LabConfig, recorder: R) -> Result<Self> {
        config.validate()?;
        let sensors = sensor_array(config, config.offsets()?);
        let telemetry = if config.telemetry.enabled {
            SensorOffsets::even(config.telemetry.count).map(|fan| SensorArray::new(fan, config.sensors.caster()))
        } else {
            None
        };
        let state = SimulationState::new(config.start.pose(&track));
        info!(
            run_id = recorder.run_id(),
            sensors = sensors.offsets().len(),
            telemetry = telemetry.is_some(),
            "training session started"
        );
        Ok(Self {
            track,
            sensors,
            telemetry,
            kinematics: config.kinematics,
            state,
            control: OperatorControl::default(),
            recorder,
            ticks: 0,
        })
    }

    pub fn press(&mut self, key: SteerKey) {
        self.control.press(key);
    }

    pub fn release(&mut self, key: SteerKey) {
        self.control.release(key);
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn set_state(&mut self, state: SimulationState) {
        self.state = state;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn into_recorder(self) -> R {
        self.recorder
    }

    /// Ray end points for display; `None` where a ray found no boundary.
    pub fn ray_endpoints(&self) -> Vec<Option<Point2<f64>>> {
        ray_endpoints(&self.sensors, &self.track, &self.state)
    }

    fn trace(&self) -> Vec<TracedRay> {
        let Some(telemetry) = &self.telemetry else {
            return Vec::new();
        };
        telemetry
            .cast_all(&self.track, &self.state.pose)
            .into_iter()
            .filter_map(|(theta, hit)| {
                hit.ok().map(|h| TracedRay {
                    theta,
                    distance: h.distance,
                })
            })
            .collect()
    }
}

impl<R: Recorder> Stepper for TrainingSession<R> {
    type Output = RecordedTick;

    fn step(&mut self) -> Result<RecordedTick> {
        let reading = self
            .sensors
            .sense(&self.track, &self.state.pose, ReadingForm::Inverse)?;
        let label = self.state.steering;
        let rays = self.trace();
        self.recorder.record_traced(reading.clone(), label, rays);

        self.state = tick(self.state, self.control.label(), &self.kinematics);
        self.ticks += 1;
        Ok(RecordedTick { reading, label })
    }
}

/// Lets the trained models steer the vehicle.
#[derive(Debug)]
pub struct InferenceSession {
    track: Track,
    sensors: SensorArray,
    models: SteeringModels,
    kinematics: Kinematics,
    state: SimulationState,
    ticks: u64,
}

impl InferenceSession {
    /// Fails with [`Error::FanMismatch`] when the models were trained on a different fan size.
    pub fn new(track: Track, config: &LabConfig, models: SteeringModels) -> Result<Self> {
        config.validate()?;
        let offsets = config.offsets()?;
        if models.sensor_count() != offsets.len() {
            return Err(Error::FanMismatch {
                models: models.sensor_count(),
                fan: offsets.len(),
            });
        }
        let state = SimulationState::new(config.start.pose(&track));
        info!(sensors = offsets.len(), "inference session started");
        Ok(Self {
            track,
            sensors: sensor_array(config, offsets),
            models,
            kinematics: config.kinematics,
            state,
            ticks: 0,
        })
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn set_state(&mut self, state: SimulationState) {
        self.state = state;
    }

    pub fn models(&self) -> &SteeringModels {
        &self.models
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ray_endpoints(&self) -> Vec<Option<Point2<f64>>> {
        ray_endpoints(&self.sensors, &self.track, &self.state)
    }
}

impl Stepper for InferenceSession {
    type Output = Decision;

    fn step(&mut self) -> Result<Decision> {
        let reading = self
            .sensors
            .sense(&self.track, &self.state.pose, ReadingForm::Inverse)?;
        let decision = decide(&reading, &self.models)?;
        self.state = tick(self.state, decision.label, &self.kinematics);
        self.ticks += 1;
        debug!(tick = self.ticks, label = %decision.label, x = self.state.pose.x(), y = self.state.pose.y(), "inference tick");
        Ok(decision)
    }
}
