use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use ort::session::builder::SessionBuilder;
use thiserror::Error;

use crate::camera::domain::camera_access::CameraAccess;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::backend::Backend;
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::pipeline::model_slot::ModelSlot;
use crate::shared::constants::BLAZEFACE_MODEL_NAME;
use crate::shared::model_resolver::{self, ModelResolveError, ModelSource, ProgressFn};

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("backend initialization failed: {0}")]
    Backend(String),
    #[error(transparent)]
    ModelResolve(#[from] ModelResolveError),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    RequestingPermission,
    InitializingBackend,
    LoadingModel,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapStage::RequestingPermission => write!(f, "Requesting camera permission"),
            BootstrapStage::InitializingBackend => write!(f, "Initializing backend"),
            BootstrapStage::LoadingModel => write!(f, "Loading face detection model"),
        }
    }
}

/// Progress reported from the bootstrap thread.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapEvent {
    Stage(BootstrapStage),
    DownloadProgress(u64, u64),
    Ready,
    Failed(String),
}

/// Backend set-up and model loading, split so the stages can be observed.
///
/// `Prepared` never leaves the bootstrap thread.
pub trait DetectorLoader: Send {
    type Prepared;

    fn initialize_backend(&self) -> Result<Self::Prepared, BootstrapError>;

    fn load(
        &self,
        prepared: Self::Prepared,
        progress: ProgressFn,
    ) -> Result<Box<dyn FaceDetector>, BootstrapError>;
}

/// Loads the BlazeFace ONNX model on the configured backend.
#[derive(Debug, Clone)]
pub struct BlazefaceLoader {
    pub backend: Backend,
    pub model: ModelSource,
    pub confidence: f64,
    pub max_faces: usize,
}

impl DetectorLoader for BlazefaceLoader {
    type Prepared = SessionBuilder;

    fn initialize_backend(&self) -> Result<SessionBuilder, BootstrapError> {
        self.backend
            .ready()
            .map_err(|e| BootstrapError::Backend(e.to_string()))
    }

    fn load(
        &self,
        prepared: SessionBuilder,
        progress: ProgressFn,
    ) -> Result<Box<dyn FaceDetector>, BootstrapError> {
        let path: PathBuf = model_resolver::resolve(BLAZEFACE_MODEL_NAME, &self.model, Some(progress))?;
        log::info!("Loading model from {}", path.display());
        let detector = OnnxBlazefaceDetector::from_builder(prepared, &path, self.confidence)
            .map_err(|e| BootstrapError::ModelLoad(e.to_string()))?
            .with_max_faces(self.max_faces);
        Ok(Box::new(detector))
    }
}

/// Run the start-up sequence: permission, backend, model, publish.
///
/// Stages run strictly in order. No retry: on failure the slot stays empty
/// and the frame loop never leaves Idle.
pub fn run<A, L>(
    access: &A,
    loader: &L,
    slot: &ModelSlot,
    events: &Sender<BootstrapEvent>,
) -> Result<(), BootstrapError>
where
    A: CameraAccess + ?Sized,
    L: DetectorLoader + ?Sized,
{
    let _ = events.send(BootstrapEvent::Stage(BootstrapStage::RequestingPermission));
    log::info!("{}", BootstrapStage::RequestingPermission);
    if !access.request_permission() {
        return Err(BootstrapError::PermissionDenied);
    }

    let _ = events.send(BootstrapEvent::Stage(BootstrapStage::InitializingBackend));
    log::info!("{}", BootstrapStage::InitializingBackend);
    let prepared = loader.initialize_backend()?;
    log::info!("Backend ready");

    let _ = events.send(BootstrapEvent::Stage(BootstrapStage::LoadingModel));
    log::info!("{}", BootstrapStage::LoadingModel);
    let tx_dl = events.clone();
    let detector = loader.load(
        prepared,
        Box::new(move |downloaded, total| {
            let _ = tx_dl.send(BootstrapEvent::DownloadProgress(downloaded, total));
        }),
    )?;

    slot.publish(detector);
    log::info!("Model ready");
    let _ = events.send(BootstrapEvent::Ready);
    Ok(())
}

/// Run bootstrap on its own thread. Failures are logged and reported as
/// [`BootstrapEvent::Failed`]; they never panic.
pub fn spawn<A, L>(
    access: A,
    loader: L,
    slot: Arc<ModelSlot>,
    events: Sender<BootstrapEvent>,
) -> JoinHandle<()>
where
    A: CameraAccess + 'static,
    L: DetectorLoader + 'static,
{
    thread::spawn(move || {
        if let Err(e) = run(&access, &loader, &slot, &events) {
            log::error!("Startup failed: {e}");
            let _ = events.send(BootstrapEvent::Failed(e.to_string()));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::camera_access::AlwaysGranted;
    use crate::detection::domain::observation::DetectionResult;
    use crate::shared::frame_tensor::FrameTensor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Denied;

    impl CameraAccess for Denied {
        fn request_permission(&self) -> bool {
            false
        }
    }

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn estimate_faces(
            &mut self,
            _tensor: &FrameTensor,
        ) -> Result<DetectionResult, Box<dyn std::error::Error>> {
            Ok(DetectionResult::empty())
        }
    }

    #[derive(Default)]
    struct FakeLoader {
        backend_fails: bool,
        load_fails: bool,
        download_steps: u64,
        backend_calls: Arc<AtomicUsize>,
    }

    impl DetectorLoader for FakeLoader {
        type Prepared = &'static str;

        fn initialize_backend(&self) -> Result<&'static str, BootstrapError> {
            self.backend_calls.fetch_add(1, Ordering::SeqCst);
            if self.backend_fails {
                return Err(BootstrapError::Backend("no runtime".into()));
            }
            Ok("cpu")
        }

        fn load(
            &self,
            prepared: &'static str,
            progress: ProgressFn,
        ) -> Result<Box<dyn FaceDetector>, BootstrapError> {
            assert_eq!(prepared, "cpu");
            for i in 1..=self.download_steps {
                progress(i, self.download_steps);
            }
            if self.load_fails {
                return Err(BootstrapError::ModelLoad("corrupt".into()));
            }
            Ok(Box::new(NoFaces))
        }
    }

    fn drain(rx: &crossbeam_channel::Receiver<BootstrapEvent>) -> Vec<BootstrapEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_success_publishes_model_after_stages_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let slot = ModelSlot::new();
        let loader = FakeLoader {
            download_steps: 2,
            ..Default::default()
        };

        run(&AlwaysGranted, &loader, &slot, &tx).unwrap();

        assert!(slot.is_published());
        assert_eq!(
            drain(&rx),
            vec![
                BootstrapEvent::Stage(BootstrapStage::RequestingPermission),
                BootstrapEvent::Stage(BootstrapStage::InitializingBackend),
                BootstrapEvent::Stage(BootstrapStage::LoadingModel),
                BootstrapEvent::DownloadProgress(1, 2),
                BootstrapEvent::DownloadProgress(2, 2),
                BootstrapEvent::Ready,
            ]
        );
    }

    #[test]
    fn test_permission_denied_stops_before_backend() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let slot = ModelSlot::new();
        let loader = FakeLoader::default();

        let err = run(&Denied, &loader, &slot, &tx).unwrap_err();

        assert!(matches!(err, BootstrapError::PermissionDenied));
        assert_eq!(loader.backend_calls.load(Ordering::SeqCst), 0);
        assert!(!slot.is_published());
    }

    #[test]
    fn test_backend_failure_leaves_slot_empty() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let slot = ModelSlot::new();
        let loader = FakeLoader {
            backend_fails: true,
            ..Default::default()
        };

        let err = run(&AlwaysGranted, &loader, &slot, &tx).unwrap_err();

        assert!(matches!(err, BootstrapError::Backend(_)));
        assert!(!slot.is_published());
    }

    #[test]
    fn test_spawned_failure_reports_event() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let slot = Arc::new(ModelSlot::new());
        let loader = FakeLoader {
            load_fails: true,
            ..Default::default()
        };

        spawn(AlwaysGranted, loader, slot.clone(), tx).join().unwrap();

        let events = drain(&rx);
        assert!(matches!(events.last(), Some(BootstrapEvent::Failed(m)) if m.contains("corrupt")));
        assert!(!events.contains(&BootstrapEvent::Ready));
        assert!(slot.try_take().is_none());
    }

    #[test]
    fn test_missing_model_file_is_resolve_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loader = BlazefaceLoader {
            backend: Backend::Cpu,
            model: ModelSource {
                path: None,
                bundled_dir: Some(tmp.path().to_path_buf()),
                url: None,
            },
            confidence: 0.75,
            max_faces: 1,
        };
        // Resolution fails before the session is touched; only exercised
        // when no cached copy exists on this machine.
        let cached = model_resolver::model_cache_dir()
            .map(|d| d.join(BLAZEFACE_MODEL_NAME).exists())
            .unwrap_or(false);
        if cached {
            return;
        }
        let resolved = model_resolver::resolve(BLAZEFACE_MODEL_NAME, &loader.model, None);
        assert!(matches!(resolved, Err(ModelResolveError::NotFound { .. })));
    }
}
