use std::sync::Arc;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::frame_tensor::FrameTensor;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("failed to open camera device {device}: {reason}")]
    Open { device: u32, reason: String },
    #[error("failed to capture frame: {0}")]
    Capture(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

/// One captured frame: the full-resolution preview plus its detector-sized tensor.
#[derive(Debug)]
pub struct CameraFrame {
    pub preview: Arc<Frame>,
    pub tensor: FrameTensor,
}

/// Produces camera frames on demand.
///
/// `next_frame` blocks only until a frame is available. Sources never queue:
/// frames that arrive while nobody asks are dropped by the source.
///
/// Not `Send`: some camera backends must stay on the thread that opened them.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError>;
}
