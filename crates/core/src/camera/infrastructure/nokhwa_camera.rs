//! Webcam capture through nokhwa.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::camera::domain::camera_access::CameraAccess;
use crate::camera::domain::camera_config::CameraConfig;
use crate::camera::domain::frame_source::{CameraError, CameraFrame, FrameSource};
use crate::camera::infrastructure::resize::resize_frame;
use crate::shared::frame::Frame;
use crate::shared::frame_tensor::TensorTracker;

/// How long to wait for the user to answer the OS permission prompt.
const PERMISSION_TIMEOUT: Duration = Duration::from_secs(120);

/// Live webcam producing preview frames plus detector-sized tensors.
///
/// `nokhwa::Camera` is not guaranteed to be `Send`, so open this on the
/// thread that will pull frames from it.
pub struct NokhwaCamera {
    camera: Camera,
    config: CameraConfig,
    tracker: TensorTracker,
    sequence: u64,
}

impl NokhwaCamera {
    pub fn open(config: CameraConfig, tracker: TensorTracker) -> Result<Self, CameraError> {
        let device = config.device_index;
        let (width, height) = config.texture;
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        debug!("Opening camera device {device} with requested texture {width}x{height}");

        let mut camera =
            Camera::new(CameraIndex::Index(device), requested).map_err(|e| CameraError::Open {
                device,
                reason: e.to_string(),
            })?;

        // Some drivers require the stream to be open before the resolution can change
        camera.open_stream().map_err(|e| CameraError::Open {
            device,
            reason: e.to_string(),
        })?;

        if let Err(e) = camera.set_resolution(Resolution::new(width, height)) {
            warn!("Could not set camera texture {width}x{height}: {e}. Using camera default.");
        }

        let actual = camera.resolution();
        info!(
            "Camera device {device} opened: {}x{} @ {} fps, resizing to {}x{} ({})",
            actual.width(),
            actual.height(),
            camera.frame_rate(),
            config.resize.width,
            config.resize.height,
            config.resize_method
        );

        Ok(Self {
            camera,
            config,
            tracker,
            sequence: 0,
        })
    }
}

impl FrameSource for NokhwaCamera {
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Decode(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let preview = Frame::new(decoded.into_raw(), width, height, 3, self.sequence);
        self.sequence += 1;

        let resized = resize_frame(&preview, self.config.resize, self.config.resize_method)?;
        Ok(CameraFrame {
            preview: Arc::new(preview),
            tensor: self.tracker.track(resized),
        })
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {e}");
        }
    }
}

/// Permission gate backed by nokhwa's platform initialization.
///
/// On macOS this shows the AVFoundation prompt; elsewhere it succeeds
/// immediately.
pub struct NokhwaAccess;

impl CameraAccess for NokhwaAccess {
    fn request_permission(&self) -> bool {
        if nokhwa::nokhwa_check() {
            return true;
        }
        let (tx, rx) = crossbeam_channel::bounded::<bool>(1);
        nokhwa::nokhwa_initialize(move |granted| {
            let _ = tx.try_send(granted);
        });
        rx.recv_timeout(PERMISSION_TIMEOUT).unwrap_or(false)
    }
}
