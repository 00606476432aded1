//! Vehicle pose primitives.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Position and heading of the vehicle at a tick.
///
/// Coordinates are real-valued pixels in screen space (x right, y down). A heading of 0
/// points along +x and increasing the heading rotates clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub center: Point2<f64>,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            center: Point2::new(x, y),
            heading,
        }
    }

    pub fn x(&self) -> f64 {
        self.center.x
    }

    pub fn y(&self) -> f64 {
        self.center.y
    }

    /// Unit vector along `heading + offset`.
    pub fn direction(&self, offset: f64) -> Vector2<f64> {
        let angle = self.heading + offset;
        Vector2::new(angle.cos(), angle.sin())
    }
}
