//! Steering labels and their one-hot storage form.

use serde::{Deserialize, Serialize};

/// The steering command active during a tick.
///
/// Exactly one label is active at a time. For storage and regression the label is
/// flattened into a [`OneHot`] triple `(turning_left, turning_right, not_turning)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SteeringLabel {
    Left,
    Right,
    #[default]
    None,
}

impl SteeringLabel {
    /// Labels in evaluation order. The predictor relies on this order for tie-breaks.
    pub const ALL: [SteeringLabel; 3] = [SteeringLabel::Left, SteeringLabel::Right, SteeringLabel::None];

    pub fn one_hot(self) -> OneHot {
        match self {
            SteeringLabel::Left => OneHot {
                turning_left: 1,
                turning_right: 0,
                not_turning: 0,
            },
            SteeringLabel::Right => OneHot {
                turning_left: 0,
                turning_right: 1,
                not_turning: 0,
            },
            SteeringLabel::None => OneHot {
                turning_left: 0,
                turning_right: 0,
                not_turning: 1,
            },
        }
    }

    /// Regression target for `self` given the label a sample was recorded with.
    pub fn indicator(self, recorded: SteeringLabel) -> f64 {
        if self == recorded {
            1.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for SteeringLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SteeringLabel::Left => "left",
            SteeringLabel::Right => "right",
            SteeringLabel::None => "none",
        };
        f.write_str(name)
    }
}

/// Stored form of a [`SteeringLabel`]: three `{0,1}` flags summing to exactly 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHot {
    pub turning_left: u8,
    pub turning_right: u8,
    pub not_turning: u8,
}

impl OneHot {
    /// Decodes the triple, rejecting anything that is not a valid one-hot encoding.
    pub fn label(&self) -> Option<SteeringLabel> {
        match (self.turning_left, self.turning_right, self.not_turning) {
            (1, 0, 0) => Some(SteeringLabel::Left),
            (0, 1, 0) => Some(SteeringLabel::Right),
            (0, 0, 1) => Some(SteeringLabel::None),
            _ => None,
        }
    }
}

impl From<SteeringLabel> for OneHot {
    fn from(label: SteeringLabel) -> Self {
        label.one_hot()
    }
}
