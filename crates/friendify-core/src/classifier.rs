//! Spatial classification of ranging samples
//!
//! Turns a raw `(distance, direction)` sample into one of four display states
//! and a rotation angle for the pointer shown to the user. Everything here is
//! pure: the same sample, threshold and previous orientation always produce
//! the same result.
//!
//! Direction vectors use the engine's device frame: `x` to the right, `y` up,
//! `-z` straight ahead of the screen.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance below which a peer counts as "close up", in meters
pub const DEFAULT_NEAR_THRESHOLD_M: f32 = 0.3;

/// 3D vector in meters; directions reported by the engine are unit length
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// Rightward component
    pub x: f32,
    /// Upward component
    pub y: f32,
    /// Toward the viewer; the device faces `-z`
    pub z: f32,
}

impl Vector3 {
    /// Build a vector from components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length; the zero vector is returned unchanged
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            return *self;
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }
}

impl std::ops::Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vector3 {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// One distance/direction fix for a single peer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangingSample {
    /// Distance in meters, if the engine has one
    pub distance: Option<f32>,
    /// Direction toward the peer, if the peer is inside the field of view
    pub direction: Option<Vector3>,
}

impl RangingSample {
    /// Sample with both distance and direction
    pub fn new(distance: f32, direction: Vector3) -> Self {
        Self {
            distance: Some(distance),
            direction: Some(direction),
        }
    }

    /// Sample that carries distance only (peer outside the field of view)
    pub fn distance_only(distance: f32) -> Self {
        Self {
            distance: Some(distance),
            direction: None,
        }
    }
}

/// Discretized spatial state of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceDirectionState {
    /// No current fix
    #[default]
    Unknown,
    /// Near and in front of the device
    CloseUpInView,
    /// In front of the device but not near
    NotCloseUpInView,
    /// No direction available
    OutOfView,
}

impl DistanceDirectionState {
    /// Whether the discrete direction indicators may be refreshed in this state
    pub fn tracks_direction(&self) -> bool {
        matches!(self, Self::CloseUpInView | Self::NotCloseUpInView)
    }
}

impl fmt::Display for DistanceDirectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::CloseUpInView => "close up, in view",
            Self::NotCloseUpInView => "in view",
            Self::OutOfView => "out of view",
        };
        f.write_str(label)
    }
}

/// Discrete direction indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Peer is to the left
    Left,
    /// Peer is to the right
    Right,
    /// Peer is above
    Up,
    /// Peer is below
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        };
        f.write_str(label)
    }
}

/// Pointer state shown for a peer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Raw azimuth in radians; 0 is straight ahead
    pub rotation_angle: f32,
    /// Left/right indicator
    pub azimuth: Option<Direction>,
    /// Up/down indicator
    pub elevation: Option<Direction>,
}

impl Orientation {
    /// Compute the orientation after `sample` moved the peer into `next`.
    ///
    /// The rotation angle follows every sample that has a direction. The
    /// discrete indicators only move while `next` tracks direction; in
    /// `OutOfView`/`Unknown` they keep their previous values.
    pub fn advance(&self, sample: &RangingSample, next: DistanceDirectionState) -> Self {
        let mut updated = *self;
        let Some(direction) = sample.direction else {
            return updated;
        };

        let angle = azimuth(&direction);
        updated.rotation_angle = angle;

        if !next.tracks_direction() {
            return updated;
        }

        updated.azimuth = Some(if angle < 0.0 {
            Direction::Left
        } else {
            Direction::Right
        });
        updated.elevation = Some(if direction.y < 0.0 {
            Direction::Down
        } else {
            Direction::Up
        });
        updated
    }
}

/// Classification plus pointer state for one peer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Spatial state
    pub state: DistanceDirectionState,
    /// Pointer state
    pub orientation: Orientation,
}

/// Azimuth of a direction vector in radians, negative to the left
pub fn azimuth(direction: &Vector3) -> f32 {
    direction.x.atan2(-direction.z)
}

/// Elevation of a direction vector in radians, negative below the horizon
pub fn elevation(direction: &Vector3) -> f32 {
    direction.y.atan2(direction.x.hypot(direction.z))
}

/// Classify a sample against a near threshold
pub fn classify(sample: &RangingSample, near_threshold_m: f32) -> DistanceDirectionState {
    if sample.distance.is_none() && sample.direction.is_none() {
        return DistanceDirectionState::Unknown;
    }

    let is_near = sample
        .distance
        .map(|distance| distance < near_threshold_m)
        .unwrap_or(false);

    match (is_near, sample.direction.is_some()) {
        (true, true) => DistanceDirectionState::CloseUpInView,
        (false, true) => DistanceDirectionState::NotCloseUpInView,
        (_, false) => DistanceDirectionState::OutOfView,
    }
}

/// Classifier bound to a configured near threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangingClassifier {
    near_threshold_m: f32,
}

impl Default for RangingClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_THRESHOLD_M)
    }
}

impl RangingClassifier {
    /// Create a classifier with the given near threshold in meters
    pub fn new(near_threshold_m: f32) -> Self {
        Self { near_threshold_m }
    }

    /// Configured near threshold
    pub fn near_threshold_m(&self) -> f32 {
        self.near_threshold_m
    }

    /// Classify `sample` given the peer's previous classification
    pub fn evaluate(&self, sample: &RangingSample, previous: &Classification) -> Classification {
        let state = classify(sample, self.near_threshold_m);
        Classification {
            state,
            orientation: previous.orientation.advance(sample, state),
        }
    }
}
