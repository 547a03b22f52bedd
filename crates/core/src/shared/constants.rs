/// Detector input resolution: every camera frame is resized to this before inference.
pub const INPUT_TENSOR_WIDTH: u32 = 152;
pub const INPUT_TENSOR_HEIGHT: u32 = 200;
pub const INPUT_TENSOR_DEPTH: u8 = 3;

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

/// Application directory name used under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "Facemark";

/// Default display refresh cadence driving the frame loop.
pub const DEFAULT_REFRESH_HZ: u32 = 60;

pub const LANDMARK_RADIUS: f32 = 2.0;
pub const FACE_BOX_OPACITY: f32 = 0.2;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
