//! Hand landmark frames and the geometry every classifier shares.
//!
//! Coordinates arrive normalised to [0,1] by the upstream tracker. Index
//! layout follows the 21-point hand model: 0 is the wrist, 9 the middle
//! finger base, 4/8/12/16/20 the thumb/index/middle/ring/pinky tips.

use log::warn;
use serde_json::Value;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// Lower bound for the palm reference so normalisation never divides by zero.
pub const PALM_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One snapshot of a single hand. A frame with fewer than 21 points is
/// still a value; classifiers answer it with their fallback label.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    points: Vec<Landmark>,
}

impl Frame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Build a frame from a JSON array of `{x, y, z}` objects.
    ///
    /// Anything malformed (not an array, a point that is not an object, a
    /// missing or non-numeric coordinate) yields an empty frame and a warning.
    pub fn from_json(value: &Value) -> Self {
        let Some(items) = value.as_array() else {
            warn!("landmarks: expected an array, got {}", json_kind(value));
            return Self::default();
        };

        let mut points = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match parse_point(item) {
                Some(p) => points.push(p),
                None => {
                    warn!("landmarks: point {i} is malformed ({item}); frame discarded");
                    return Self::default();
                }
            }
        }
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the frame carries the full 21-point hand.
    pub fn is_complete(&self) -> bool {
        self.points.len() >= LANDMARK_COUNT
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}

fn parse_point(v: &Value) -> Option<Landmark> {
    let coord = |k: &str| v.get(k).and_then(Value::as_f64).map(|c| c as f32);
    Some(Landmark::new(coord("x")?, coord("y")?, coord("z")?))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Euclidean distance using all three axes.
pub fn distance3(a: &Landmark, b: &Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Euclidean distance in the image plane; z is ignored because the tracker's
/// depth estimate is noisy.
pub fn distance2(a: &Landmark, b: &Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Wrist to middle-finger-base distance, the scale reference for every
/// palm-normalised threshold.
pub fn palm_size(points: &[Landmark]) -> f32 {
    if points.len() <= MIDDLE_MCP {
        return 1.0;
    }
    distance2(&points[WRIST], &points[MIDDLE_MCP]).max(PALM_EPSILON)
}

#[cfg(test)]
pub(crate) fn make_frame(set: &[(usize, f32, f32, f32)]) -> Frame {
    let mut points = vec![Landmark::default(); LANDMARK_COUNT];
    for &(idx, x, y, z) in set {
        points[idx] = Landmark::new(x, y, z);
    }
    Frame::new(points)
}
