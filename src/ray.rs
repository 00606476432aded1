//! Ray marching against a [`Track`].

use nalgebra::{Point2, Vector2};
use thiserror::Error;
use tracing::debug;

use crate::track::{Cell, Track};

/// Distance between consecutive samples along a ray, in pixels.
pub const RAY_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum RayError {
    /// The ray left the bitmap before touching a wall. `steps` counts the in-bounds
    /// samples taken, so an origin outside the map reports 0.
    #[error("no boundary found along ray at {angle:.4} rad after {steps} steps")]
    NoBoundary { angle: f64, steps: usize },
    #[error("ray at {angle:.4} rad exceeded {max_steps} steps without a hit")]
    StepLimit { angle: f64, max_steps: usize },
}

/// A successful ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Euclidean distance from the origin to the first wall sample.
    pub distance: f64,
    /// The sample point that hit the wall.
    pub end: Point2<f64>,
}

/// Marches a point outward in fixed increments until it lands on a wall pixel.
///
/// Samples are truncated to integer pixels before lookup, so distances carry up to one
/// pixel of slack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCaster {
    step: f64,
    max_steps: Option<usize>,
}

impl Default for RayCaster {
    fn default() -> Self {
        Self {
            step: RAY_STEP,
            max_steps: None,
        }
    }
}

impl RayCaster {
    /// `step` must be positive and finite. Without an explicit `max_steps` the march is
    /// bounded by the track diagonal.
    pub fn new(step: f64, max_steps: Option<usize>) -> Self {
        debug_assert!(step > 0.0 && step.is_finite(), "ray step must be positive: {step}");
        Self { step, max_steps }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    fn step_budget(&self, track: &Track) -> usize {
        self.max_steps.unwrap_or_else(|| {
            let w = f64::from(track.width());
            let h = f64::from(track.height());
            (w.hypot(h) / self.step).ceil() as usize + 2
        })
    }

    /// Casts a ray from `origin` along the absolute `angle` (radians).
    pub fn cast(&self, track: &Track, origin: Point2<f64>, angle: f64) -> Result<RayHit, RayError> {
        let max_steps = self.step_budget(track);
        let dir = Vector2::new(angle.cos(), angle.sin());

        for i in 0..max_steps {
            let point = origin + dir * (i as f64 * self.step);
            match track.cell_at(point.x, point.y) {
                Cell::Drivable => {}
                Cell::Wall => {
                    let distance = (point - origin).norm();
                    debug!(angle, distance, steps = i, "ray hit wall");
                    return Ok(RayHit {
                        distance,
                        end: point,
                    });
                }
                Cell::OffMap => return Err(RayError::NoBoundary { angle, steps: i }),
            }
        }

        Err(RayError::StepLimit { angle, max_steps })
    }
}

/// Casts with the default 0.1 pixel step and returns only the distance.
pub fn cast_ray(track: &Track, origin: Point2<f64>, angle: f64) -> Result<f64, RayError> {
    RayCaster::default().cast(track, origin, angle).map(|hit| hit.distance)
}
