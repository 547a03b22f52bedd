use serde::{Deserialize, Serialize};

/// 2D point in detector input (tensor) pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// One detected face: bounding corners plus an ordered list of landmarks.
///
/// The landmark count is fixed by the model (six for BlazeFace: right eye,
/// left eye, nose tip, mouth, right ear tragion, left ear tragion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub top_left: Point,
    pub bottom_right: Point,
    pub landmarks: Vec<Point>,
    pub probability: f32,
}

impl Observation {
    pub fn width(&self) -> f32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f32 {
        self.bottom_right.y - self.top_left.y
    }
}

/// All faces found in one frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionResult {
    observations: Vec<Observation>,
}

impl DetectionResult {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The only observation consumers draw; the rest are ignored.
    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
