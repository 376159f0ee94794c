//! Landmark geometry: pairing raw coordinates and deriving posture features.
//!
//! Senders stream a flat list `[x0, y0, x1, y1, ...]` in source-image pixel
//! space. Only a handful of points matter for the coarse posture label: the
//! nose, both shoulders and both hips. Their Y coordinates are divided by a
//! fixed reference frame height rather than the real camera height, which the
//! wire format does not carry. Features are therefore only meaningful for a
//! portrait 1080×1920 capture and are not clamped to `[0, 1]`.

use serde::{Deserialize, Serialize};

/// Reference frame width in pixels. Unused by the current features.
pub const REFERENCE_FRAME_WIDTH: f64 = 1080.0;

/// Reference frame height in pixels used to normalize Y coordinates.
pub const REFERENCE_FRAME_HEIGHT: f64 = 1920.0;

/// Landmark index of the nose.
pub const NOSE: usize = 0;
/// Landmark index of the left shoulder.
pub const LEFT_SHOULDER: usize = 11;
/// Landmark index of the right shoulder.
pub const RIGHT_SHOULDER: usize = 12;
/// Landmark index of the left hip.
pub const LEFT_HIP: usize = 23;
/// Landmark index of the right hip.
pub const RIGHT_HIP: usize = 24;

/// Minimum number of coordinate pairs a frame needs (indices up to 24).
pub const MIN_LANDMARK_PAIRS: usize = RIGHT_HIP + 1;

/// Substituted normalized Y for a missing nose or shoulder point.
const DEFAULT_UPPER_Y: f64 = 0.5;
/// Substituted normalized Y for a missing hip point.
const DEFAULT_HIP_Y: f64 = 0.6;

/// A single landmark in source-image pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2 {
    /// Horizontal pixel coordinate.
    pub x: f64,
    /// Vertical pixel coordinate (grows downward).
    pub y: f64,
}

/// Normalized features derived from one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostureFeatures {
    /// Normalized Y of the nose.
    pub nose_y: f64,
    /// Mean normalized Y of both shoulders.
    pub shoulder_y: f64,
    /// Mean normalized Y of both hips.
    pub hip_y: f64,
    /// `|shoulder_y - hip_y|`.
    pub torso_length: f64,
}

impl PostureFeatures {
    /// Build features from shoulder and hip heights, deriving the torso length.
    pub fn from_heights(shoulder_y: f64, hip_y: f64) -> Self {
        Self {
            nose_y: DEFAULT_UPPER_Y,
            shoulder_y,
            hip_y,
            torso_length: (shoulder_y - hip_y).abs(),
        }
    }
}

/// Pair a flat coordinate list into points. A trailing unpaired scalar is
/// dropped.
pub fn pair_coordinates(raw: &[f64]) -> Vec<Point2> {
    raw.chunks_exact(2)
        .map(|pair| Point2 {
            x: pair[0],
            y: pair[1],
        })
        .collect()
}

/// Whether `points` contains every landmark the features read.
pub fn has_required_landmarks(points: &[Point2]) -> bool {
    points.len() >= MIN_LANDMARK_PAIRS
}

/// Derive posture features from paired landmarks.
///
/// Callers check [`has_required_landmarks`] first. An index that is still
/// out of bounds falls back to a fixed default for that point only.
pub fn extract_features(points: &[Point2]) -> PostureFeatures {
    let normalized_y = |index: usize, default: f64| {
        points
            .get(index)
            .map_or(default, |p| p.y / REFERENCE_FRAME_HEIGHT)
    };

    let nose_y = normalized_y(NOSE, DEFAULT_UPPER_Y);
    let shoulder_y = (normalized_y(LEFT_SHOULDER, DEFAULT_UPPER_Y)
        + normalized_y(RIGHT_SHOULDER, DEFAULT_UPPER_Y))
        / 2.0;
    let hip_y = (normalized_y(LEFT_HIP, DEFAULT_HIP_Y) + normalized_y(RIGHT_HIP, DEFAULT_HIP_Y)) / 2.0;

    PostureFeatures {
        nose_y,
        shoulder_y,
        hip_y,
        torso_length: (shoulder_y - hip_y).abs(),
    }
}
