use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{INPUT_TENSOR_DEPTH, INPUT_TENSOR_HEIGHT, INPUT_TENSOR_WIDTH};
use crate::shared::platform::PlatformFamily;

/// How camera frames are shrunk to the detector input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Triangle-filtered resize on the CPU. Slower, smoother input.
    #[default]
    Filtered,
    /// Nearest-neighbour sampling. Lower latency, aliased input.
    Nearest,
}

impl ResizeMethod {
    pub const ALL: &[ResizeMethod] = &[ResizeMethod::Filtered, ResizeMethod::Nearest];
}

impl fmt::Display for ResizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeMethod::Filtered => write!(f, "filtered"),
            ResizeMethod::Nearest => write!(f, "nearest"),
        }
    }
}

impl FromStr for ResizeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filtered" => Ok(ResizeMethod::Filtered),
            "nearest" => Ok(ResizeMethod::Nearest),
            other => Err(format!(
                "Resize method must be 'filtered' or 'nearest', got '{other}'"
            )),
        }
    }
}

/// Target dimensions of the frame tensor handed to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
}

impl Default for ResizeTarget {
    fn default() -> Self {
        Self {
            width: INPUT_TENSOR_WIDTH,
            height: INPUT_TENSOR_HEIGHT,
            depth: INPUT_TENSOR_DEPTH,
        }
    }
}

/// Camera capture options.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device index; 0 is the default (user-facing) webcam.
    pub device_index: u32,
    /// Requested capture resolution `(width, height)`.
    pub texture: (u32, u32),
    pub resize: ResizeTarget,
    pub resize_method: ResizeMethod,
}

impl CameraConfig {
    pub fn for_platform(family: PlatformFamily) -> Self {
        Self {
            device_index: 0,
            texture: family.texture_dims(),
            resize: ResizeTarget::default(),
            resize_method: ResizeMethod::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::for_platform(PlatformFamily::current())
    }
}
