use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use facemark_core::camera::domain::camera_config::CameraConfig;
use facemark_core::camera::domain::frame_source::FrameSource;
use facemark_core::camera::infrastructure::nokhwa_camera::{NokhwaAccess, NokhwaCamera};
use facemark_core::pipeline::bootstrap::{self, BlazefaceLoader, BootstrapEvent};
use facemark_core::pipeline::frame_loop::{self, FrameLoopHandle, FrameOutputs};
use facemark_core::pipeline::loop_logger::LogLoopLogger;
use facemark_core::pipeline::model_slot::ModelSlot;
use facemark_core::pipeline::ticker::IntervalTicker;
use facemark_core::shared::constants::DEFAULT_REFRESH_HZ;
use facemark_core::shared::frame_tensor::TensorTracker;
use facemark_core::shared::model_resolver::ModelSource;

use crate::settings::Settings;

/// Background work behind the camera view: bootstrap plus the frame loop.
pub struct CameraSession {
    pub outputs: FrameOutputs,
    pub events: Receiver<BootstrapEvent>,
    pub handle: Option<FrameLoopHandle>,
}

/// Start bootstrap and the frame loop. The loop idles until bootstrap
/// publishes the model, then opens the camera.
pub fn start(settings: &Settings) -> CameraSession {
    let slot = Arc::new(ModelSlot::new());
    let (tx, rx) = crossbeam_channel::unbounded();

    let loader = BlazefaceLoader {
        backend: settings.backend,
        model: ModelSource {
            path: settings.model_path.clone(),
            bundled_dir: bundled_model_dir(),
            url: settings.model_url.clone(),
        },
        confidence: settings.confidence,
        max_faces: settings.max_faces,
    };
    bootstrap::spawn(NokhwaAccess, loader, slot.clone(), tx);

    let config = CameraConfig {
        device_index: settings.device_index,
        resize_method: settings.resize_method,
        ..CameraConfig::default()
    };
    let tracker = TensorTracker::new();
    let outputs = FrameOutputs::default();
    let handle = frame_loop::spawn(
        Box::new(move || {
            let camera = NokhwaCamera::open(config, tracker)?;
            Ok(Box::new(camera) as Box<dyn FrameSource>)
        }),
        slot,
        outputs.clone(),
        Box::new(LogLoopLogger::default()),
        Box::new(IntervalTicker::from_hz(DEFAULT_REFRESH_HZ)),
    );

    CameraSession {
        outputs,
        events: rx,
        handle: Some(handle),
    }
}

fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}
