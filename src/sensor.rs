//! Sensor fans and the readings they produce.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::pose::Pose;
use crate::ray::{RayCaster, RayError, RayHit};
use crate::track::Track;

/// Offsets of the five-ray fan used for training and prediction, in reading order.
pub const COARSE_OFFSETS: [f64; 5] = [FRAC_PI_2, FRAC_PI_4, 0.0, -FRAC_PI_4, -FRAC_PI_2];

/// Ray count of the fine visualisation fan.
pub const FINE_FAN_COUNT: usize = 20;

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum SensorError {
    #[error(transparent)]
    Ray(#[from] RayError),
    /// An inverse reading was requested but the ray hit a wall at distance zero.
    #[error("sensor at {angle:.4} rad starts inside a wall")]
    InsideWall { angle: f64 },
}

/// How the sensor array treats a ray that never finds a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MissingBoundary {
    /// Propagate the ray failure.
    #[default]
    Fail,
    /// Substitute a fixed distance and log it.
    Cap { max_distance: f64 },
}

/// Distance representation requested from the sensor array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingForm {
    /// Pixels to the nearest wall.
    Raw,
    /// `1 / distance`. Near-wall readings dominate, which is what the regression wants.
    Inverse,
}

/// Angular offsets relative to the heading. Immutable once built.
///
/// Positive offsets point clockwise on screen, i.e. to the right of the heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorOffsets(Vec<f64>);

impl SensorOffsets {
    /// Returns `None` for an empty fan or non-finite offsets.
    pub fn new(offsets: Vec<f64>) -> Option<Self> {
        (!offsets.is_empty() && offsets.iter().all(|o| o.is_finite())).then_some(Self(offsets))
    }

    /// The five-ray fan: ±90°, ±45° and straight ahead.
    pub fn coarse() -> Self {
        Self(COARSE_OFFSETS.to_vec())
    }

    /// `count` rays covering a half-turn: `theta_i = π·(i − count/2)/count`.
    pub fn even(count: usize) -> Option<Self> {
        Self::even_spread(count, PI)
    }

    /// `count` rays evenly covering `spread` radians, starting at `-spread / 2`.
    pub fn even_spread(count: usize, spread: f64) -> Option<Self> {
        let half = count as f64 / 2.0;
        Self::new(
            (0..count)
                .map(|i| spread * (i as f64 - half) / count as f64)
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One value per sensor offset, in fan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading(Vec<f64>);

impl Reading {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for Reading {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A fan of distance sensors bound to a ray caster.
///
/// Sensing is pure: it neither logs samples nor persists anything.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorArray {
    offsets: SensorOffsets,
    caster: RayCaster,
    missing_boundary: MissingBoundary,
}

impl SensorArray {
    pub fn new(offsets: SensorOffsets, caster: RayCaster) -> Self {
        Self {
            offsets,
            caster,
            missing_boundary: MissingBoundary::Fail,
        }
    }

    pub fn with_missing_boundary(mut self, policy: MissingBoundary) -> Self {
        self.missing_boundary = policy;
        self
    }

    pub fn offsets(&self) -> &SensorOffsets {
        &self.offsets
    }

    /// Casts every ray of the fan. Results keep fan order; failures are left to the caller.
    pub fn cast_all(&self, track: &Track, pose: &Pose) -> Vec<(f64, Result<RayHit, RayError>)> {
        self.offsets
            .as_slice()
            .iter()
            .map(|offset| {
                let angle = pose.heading + offset;
                (*offset, self.caster.cast(track, pose.center, angle))
            })
            .collect()
    }

    fn distance(&self, track: &Track, pose: &Pose, offset: f64) -> Result<f64, SensorError> {
        let angle = pose.heading + offset;
        match self.caster.cast(track, pose.center, angle) {
            Ok(hit) => Ok(hit.distance),
            Err(err) => match self.missing_boundary {
                MissingBoundary::Fail => Err(err.into()),
                MissingBoundary::Cap { max_distance } => {
                    warn!(%err, max_distance, "capping sensor distance");
                    Ok(max_distance)
                }
            },
        }
    }

    /// Produces one reading, with one value per offset in fan order.
    pub fn sense(&self, track: &Track, pose: &Pose, form: ReadingForm) -> Result<Reading, SensorError> {
        self.offsets
            .as_slice()
            .iter()
            .map(|&offset| {
                let distance = self.distance(track, pose, offset)?;
                match form {
                    ReadingForm::Raw => Ok(distance),
                    ReadingForm::Inverse if distance > 0.0 => Ok(1.0 / distance),
                    ReadingForm::Inverse => Err(SensorError::InsideWall {
                        angle: pose.heading + offset,
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Reading)
    }
}

/// Raw-distance reading for `pose` using the default caster.
pub fn sense(track: &Track, pose: &Pose, offsets: &SensorOffsets) -> Result<Reading, SensorError> {
    SensorArray::new(offsets.clone(), RayCaster::default()).sense(track, pose, ReadingForm::Raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fine_fan_spans_half_turn() {
        let fan = SensorOffsets::even(FINE_FAN_COUNT).unwrap();
        assert_eq!(fan.len(), 20);
        assert_abs_diff_eq!(fan.as_slice()[0], -FRAC_PI_2);
        assert_abs_diff_eq!(fan.as_slice()[10], 0.0);
        assert_abs_diff_eq!(fan.as_slice()[19], PI * 9.0 / 20.0);
    }

    #[test]
    fn empty_fans_are_rejected() {
        assert!(SensorOffsets::new(Vec::new()).is_none());
        assert!(SensorOffsets::even(0).is_none());
        assert!(SensorOffsets::new(vec![f64::NAN]).is_none());
    }

    #[test]
    fn reading_length_matches_fan() {
        let track = Track::bordered(60, 40).unwrap();
        let pose = Pose::new(30.0, 20.0, 0.3);
        for count in [1, 3, 5, 8, 20] {
            let fan = SensorOffsets::even(count).unwrap();
            assert_eq!(sense(&track, &pose, &fan).unwrap().len(), count);
        }
        assert_eq!(sense(&track, &pose, &SensorOffsets::coarse()).unwrap().len(), 5);
    }

    #[test]
    fn coarse_fan_order_is_right_to_left() {
        // Heading +x in a tall corridor: +π/2 points down (screen), which is closer here.
        let track = Track::bordered(200, 100).unwrap();
        let pose = Pose::new(100.0, 70.0, 0.0);
        let reading = sense(&track, &pose, &SensorOffsets::coarse()).unwrap();
        let v = reading.values();
        assert!(v[0] < v[4], "right side should be nearer: {v:?}");
        assert_abs_diff_eq!(v[0], 29.0, epsilon = 1.0);
        assert_abs_diff_eq!(v[4], 70.0, epsilon = 1.0);
    }

    #[test]
    fn inverse_form_inverts_each_distance() {
        let track = Track::bordered(100, 100).unwrap();
        let pose = Pose::new(50.0, 50.0, 0.0);
        let array = SensorArray::new(SensorOffsets::coarse(), RayCaster::default());
        let raw = array.sense(&track, &pose, ReadingForm::Raw).unwrap();
        let inv = array.sense(&track, &pose, ReadingForm::Inverse).unwrap();
        for (r, i) in raw.values().iter().zip(inv.values()) {
            assert_abs_diff_eq!(r * i, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse_on_a_wall_is_an_error() {
        let track = Track::bordered(100, 100).unwrap();
        let pose = Pose::new(0.0, 50.0, 0.0);
        let array = SensorArray::new(SensorOffsets::new(vec![0.0]).unwrap(), RayCaster::default());
        assert!(matches!(
            array.sense(&track, &pose, ReadingForm::Inverse),
            Err(SensorError::InsideWall { .. })
        ));
    }

    #[test]
    fn cap_policy_substitutes_missing_boundaries() {
        let track = Track::from_fn(20, 20, |_, _| 0).unwrap();
        let pose = Pose::new(10.0, 10.0, 0.0);
        let offsets = SensorOffsets::new(vec![0.0]).unwrap();
        let failing = SensorArray::new(offsets.clone(), RayCaster::default());
        assert!(matches!(
            failing.sense(&track, &pose, ReadingForm::Raw),
            Err(SensorError::Ray(RayError::NoBoundary { .. }))
        ));

        let capped = failing.with_missing_boundary(MissingBoundary::Cap { max_distance: 250.0 });
        let reading = capped.sense(&track, &pose, ReadingForm::Raw).unwrap();
        assert_eq!(reading.values(), &[250.0]);
    }
}
