//! Vehicle kinematics and the per-tick simulation state.

use serde::{Deserialize, Serialize};

use crate::pose::Pose;
use crate::steering::SteeringLabel;

/// Default forward speed, in pixels per tick.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Default heading change per turning tick, in radians.
pub const DEFAULT_ANGULAR_STEP: f64 = 0.02;

/// Fixed motion constants for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_angular_step")]
    pub angular_step: f64,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

fn default_angular_step() -> f64 {
    DEFAULT_ANGULAR_STEP
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            angular_step: DEFAULT_ANGULAR_STEP,
        }
    }
}

/// Everything that changes from one tick to the next.
///
/// `steering` is the label that the next kinematics update will apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub pose: Pose,
    pub steering: SteeringLabel,
}

impl SimulationState {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            steering: SteeringLabel::None,
        }
    }
}

/// Advances the simulation by one tick.
///
/// The vehicle moves along its current heading, then the heading turns according to the
/// state's active label (RIGHT adds `angular_step`, LEFT subtracts it). `command` becomes
/// the active label for the following tick.
pub fn tick(state: SimulationState, command: SteeringLabel, kinematics: &Kinematics) -> SimulationState {
    let mut pose = state.pose;
    let advance = pose.direction(0.0) * kinematics.speed;
    pose.center += advance;
    match state.steering {
        SteeringLabel::Left => pose.heading -= kinematics.angular_step,
        SteeringLabel::Right => pose.heading += kinematics.angular_step,
        SteeringLabel::None => {}
    }
    SimulationState {
        pose,
        steering: command,
    }
}

/// Operator steering keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerKey {
    Left,
    Right,
}

impl SteerKey {
    fn label(self) -> SteeringLabel {
        match self {
            SteerKey::Left => SteeringLabel::Left,
            SteerKey::Right => SteeringLabel::Right,
        }
    }
}

/// Tracks the label selected by operator key events during data collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorControl {
    current: SteeringLabel,
}

impl OperatorControl {
    pub fn press(&mut self, key: SteerKey) {
        self.current = key.label();
    }

    /// Releasing a key only clears the label it selected.
    pub fn release(&mut self, key: SteerKey) {
        if self.current == key.label() {
            self.current = SteeringLabel::None;
        }
    }

    pub fn label(&self) -> SteeringLabel {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn straight_tick_moves_along_heading() {
        let state = SimulationState::new(Pose::new(10.0, 10.0, FRAC_PI_2));
        let next = tick(state, SteeringLabel::None, &Kinematics::default());
        assert_abs_diff_eq!(next.pose.x(), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next.pose.y(), 11.0, epsilon = 1e-12);
        assert_eq!(next.pose.heading, FRAC_PI_2);
    }

    #[test]
    fn active_label_turns_after_moving() {
        let k = Kinematics::default();
        let mut state = SimulationState::new(Pose::new(0.0, 0.0, PI));
        state.steering = SteeringLabel::Right;

        let next = tick(state, SteeringLabel::Left, &k);
        // Moved along the old heading.
        assert_abs_diff_eq!(next.pose.x(), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next.pose.heading, PI + 0.02, epsilon = 1e-12);
        assert_eq!(next.steering, SteeringLabel::Left);

        let after = tick(next, SteeringLabel::None, &k);
        assert_abs_diff_eq!(after.pose.heading, PI, epsilon = 1e-12);
    }

    #[test]
    fn release_only_clears_matching_key() {
        let mut control = OperatorControl::default();
        assert_eq!(control.label(), SteeringLabel::None);

        control.press(SteerKey::Left);
        control.press(SteerKey::Right);
        control.release(SteerKey::Left);
        assert_eq!(control.label(), SteeringLabel::Right);

        control.release(SteerKey::Right);
        assert_eq!(control.label(), SteeringLabel::None);
    }
}
