use std::path::Path;
use std::sync::Arc;

use crate::camera::domain::camera_config::{ResizeMethod, ResizeTarget};
use crate::camera::domain::frame_source::{CameraError, CameraFrame, FrameSource};
use crate::camera::infrastructure::resize::resize_frame;
use crate::shared::frame::Frame;
use crate::shared::frame_tensor::TensorTracker;

/// Frame source that replays a still image, one copy per request.
///
/// Stands in for a camera when running on image files or in tests.
pub struct ImageFileSource {
    preview: Arc<Frame>,
    resized: Frame,
    tracker: TensorTracker,
    sequence: u64,
}

impl ImageFileSource {
    pub fn open(
        path: &Path,
        target: ResizeTarget,
        method: ResizeMethod,
        tracker: TensorTracker,
    ) -> Result<Self, CameraError> {
        let img = image::open(path)
            .map_err(|e| CameraError::Open {
                device: 0,
                reason: format!("{}: {e}", path.display()),
            })?
            .to_rgb8();
        let (w, h) = img.dimensions();
        Self::from_frame(Frame::new(img.into_raw(), w, h, 3, 0), target, method, tracker)
    }

    pub fn from_frame(
        frame: Frame,
        target: ResizeTarget,
        method: ResizeMethod,
        tracker: TensorTracker,
    ) -> Result<Self, CameraError> {
        let resized = resize_frame(&frame, target, method)?;
        Ok(Self {
            preview: Arc::new(frame),
            resized,
            tracker,
            sequence: 0,
        })
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
        let r = &self.resized;
        let tensor = Frame::new(
            r.data().to_vec(),
            r.width(),
            r.height(),
            r.channels(),
            self.sequence,
        );
        self.sequence += 1;
        Ok(CameraFrame {
            preview: self.preview.clone(),
            tensor: self.tracker.track(tensor),
        })
    }
}
