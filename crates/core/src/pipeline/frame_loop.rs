use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;

use crate::camera::domain::frame_source::{CameraError, CameraFrame, FrameSource};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::observation::DetectionResult;
use crate::pipeline::loop_logger::LoopLogger;
use crate::pipeline::model_slot::ModelSlot;
use crate::pipeline::ticker::Ticker;
use crate::shared::frame::Frame;
use crate::shared::latest_slot::LatestSlot;

#[derive(Error, Debug)]
pub enum FrameLoopError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("frame loop thread panicked")]
    Panicked,
}

/// Opens the frame source once the model is ready.
pub type OpenSource = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>, CameraError>>;

/// Same as [`OpenSource`], movable into the loop thread.
pub type SendOpenSource = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>, CameraError> + Send>;

/// Slots the loop publishes into and the presentation layer reads from.
#[derive(Clone, Default)]
pub struct FrameOutputs {
    pub results: Arc<LatestSlot<DetectionResult>>,
    pub previews: Arc<LatestSlot<Frame>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the model; frames are not pulled.
    Idle,
    Running,
    /// Camera failed to open; nothing further happens.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Detected { faces: usize },
    Stopped,
}

enum State {
    Idle { open_source: OpenSource },
    Running {
        detector: Box<dyn FaceDetector>,
        source: Box<dyn FrameSource>,
    },
    Closed,
}

/// Per-tick frame acquisition: pull, detect, publish, release.
///
/// Idle until the model slot yields a detector, then Running for the rest
/// of its life. Inference for the next frame never starts before the
/// current one finishes, so slow inference drops frames instead of queueing.
pub struct FrameLoop {
    state: State,
    model: Arc<ModelSlot>,
    outputs: FrameOutputs,
    cancelled: Arc<AtomicBool>,
    logger: Box<dyn LoopLogger>,
}

impl FrameLoop {
    pub fn new(
        open_source: OpenSource,
        model: Arc<ModelSlot>,
        outputs: FrameOutputs,
        cancelled: Arc<AtomicBool>,
        logger: Box<dyn LoopLogger>,
    ) -> Self {
        Self {
            state: State::Idle { open_source },
            model,
            outputs,
            cancelled,
            logger,
        }
    }

    /// Loop over an already-open source.
    pub fn with_source(
        source: Box<dyn FrameSource>,
        model: Arc<ModelSlot>,
        outputs: FrameOutputs,
        cancelled: Arc<AtomicBool>,
        logger: Box<dyn LoopLogger>,
    ) -> Self {
        Self::new(Box::new(move || Ok(source)), model, outputs, cancelled, logger)
    }

    pub fn state(&self) -> LoopState {
        match self.state {
            State::Idle { .. } => LoopState::Idle,
            State::Running { .. } => LoopState::Running,
            State::Closed => LoopState::Closed,
        }
    }

    pub fn tick(&mut self) -> Result<TickOutcome, FrameLoopError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Ok(TickOutcome::Stopped);
        }

        if let State::Idle { .. } = self.state {
            if !self.start_if_model_ready()? {
                self.logger.idle_tick();
                return Ok(TickOutcome::Idle);
            }
        }

        let State::Running { detector, source } = &mut self.state else {
            return Ok(TickOutcome::Stopped);
        };

        let CameraFrame { preview, tensor } = source.next_frame()?;
        self.outputs.previews.publish_arc(preview);

        let started = Instant::now();
        let estimate = detector.estimate_faces(&tensor);
        tensor.release();
        let result = estimate.map_err(|e| FrameLoopError::Detection(e.to_string()))?;

        let faces = result.len();
        self.logger
            .inference(started.elapsed().as_secs_f64() * 1000.0, faces);
        self.outputs.results.publish(result);
        Ok(TickOutcome::Detected { faces })
    }

    /// Drive ticks until cancelled or an error ends the loop.
    pub fn run(&mut self, ticker: &mut dyn Ticker) -> Result<(), FrameLoopError> {
        let outcome = loop {
            ticker.wait_tick();
            match self.tick() {
                Ok(TickOutcome::Stopped) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.logger.summary();
        outcome
    }

    /// Idle -> Running transition. Returns false while the model is pending.
    fn start_if_model_ready(&mut self) -> Result<bool, FrameLoopError> {
        if !matches!(self.state, State::Idle { .. }) {
            return Ok(false);
        }
        let Some(detector) = self.model.try_take() else {
            return Ok(false);
        };
        let State::Idle { open_source } = std::mem::replace(&mut self.state, State::Closed) else {
            return Ok(false);
        };
        self.logger.info("Model ready, opening camera");
        let source = open_source()?;
        self.state = State::Running { detector, source };
        Ok(true)
    }
}

/// Handle to a frame loop running on its own thread.
pub struct FrameLoopHandle {
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<Result<(), FrameLoopError>>,
}

impl FrameLoopHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<(), FrameLoopError> {
        self.thread.join().unwrap_or(Err(FrameLoopError::Panicked))
    }
}

/// Spawn the frame loop on a dedicated thread.
///
/// The source is opened on that thread, after the model becomes available.
pub fn spawn(
    open_source: SendOpenSource,
    model: Arc<ModelSlot>,
    outputs: FrameOutputs,
    logger: Box<dyn LoopLogger>,
    mut ticker: Box<dyn Ticker + Send>,
) -> FrameLoopHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let token = cancelled.clone();

    let thread = thread::spawn(move || {
        let mut frame_loop = FrameLoop::new(open_source, model, outputs, token, logger);
        let result = frame_loop.run(ticker.as_mut());
        if let Err(ref e) = result {
            log::error!("Frame loop stopped: {e}");
        }
        result
    });

    FrameLoopHandle { cancelled, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::observation::{Observation, Point};
    use crate::overlay::projector::{project, OverlayConfig};
    use crate::pipeline::loop_logger::NullLoopLogger;
    use crate::pipeline::ticker::ImmediateTicker;
    use crate::shared::frame_tensor::{FrameTensor, TensorTracker};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingSource {
        tracker: TensorTracker,
        pulls: Arc<AtomicUsize>,
        fail_at: Option<usize>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
            let n = self.pulls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(n) {
                return Err(CameraError::Capture("unplugged".into()));
            }
            let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, n as u64);
            Ok(CameraFrame {
                preview: Arc::new(frame.clone()),
                tensor: self.tracker.track(frame),
            })
        }
    }

    struct ScriptedDetector {
        calls: Arc<AtomicUsize>,
        live_during_call: Arc<AtomicUsize>,
        tracker: TensorTracker,
        fail_at: Option<usize>,
        cancel_at: Option<(usize, Arc<AtomicBool>)>,
    }

    impl FaceDetector for ScriptedDetector {
        fn estimate_faces(
            &mut self,
            tensor: &FrameTensor,
        ) -> Result<DetectionResult, Box<dyn std::error::Error>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.live_during_call
                .fetch_max(self.tracker.live(), Ordering::SeqCst);
            if let Some((at, ref token)) = self.cancel_at {
                if n == at {
                    token.store(true, Ordering::SeqCst);
                }
            }
            if self.fail_at == Some(n) {
                return Err("model exploded".into());
            }
            Ok(DetectionResult::new(vec![Observation {
                top_left: Point::new(tensor.sequence() as f32, 0.0),
                bottom_right: Point::new(10.0, 10.0),
                landmarks: vec![Point::new(1.0, 1.0)],
                probability: 0.9,
            }]))
        }
    }

    struct Harness {
        tracker: TensorTracker,
        pulls: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        live_during_call: Arc<AtomicUsize>,
        model: Arc<ModelSlot>,
        outputs: FrameOutputs,
        cancelled: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tracker: TensorTracker::new(),
                pulls: Arc::new(AtomicUsize::new(0)),
                calls: Arc::new(AtomicUsize::new(0)),
                live_during_call: Arc::new(AtomicUsize::new(0)),
                model: Arc::new(ModelSlot::new()),
                outputs: FrameOutputs::default(),
                cancelled: Arc::new(AtomicBool::new(false)),
            }
        }

        fn source(&self, fail_at: Option<usize>) -> Box<dyn FrameSource> {
            Box::new(CountingSource {
                tracker: self.tracker.clone(),
                pulls: self.pulls.clone(),
                fail_at,
            })
        }

        fn detector(&self, fail_at: Option<usize>) -> ScriptedDetector {
            ScriptedDetector {
                calls: self.calls.clone(),
                live_during_call: self.live_during_call.clone(),
                tracker: self.tracker.clone(),
                fail_at,
                cancel_at: None,
            }
        }

        fn frame_loop(&self, source_fail_at: Option<usize>) -> FrameLoop {
            FrameLoop::with_source(
                self.source(source_fail_at),
                self.model.clone(),
                self.outputs.clone(),
                self.cancelled.clone(),
                Box::new(NullLoopLogger),
            )
        }
    }

    #[test]
    fn test_idle_before_model_performs_no_inference() {
        let h = Harness::new();
        let mut fl = h.frame_loop(None);

        for _ in 0..5 {
            assert_eq!(fl.tick().unwrap(), TickOutcome::Idle);
        }

        assert_eq!(fl.state(), LoopState::Idle);
        assert_eq!(h.pulls.load(Ordering::SeqCst), 0);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert!(h.outputs.results.latest().is_none());
        assert!(h.outputs.previews.latest().is_none());
        let overlay = project(
            h.outputs.results.latest().as_deref(),
            &OverlayConfig::default(),
        );
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_source_opened_only_when_model_arrives() {
        let h = Harness::new();
        let opened = Arc::new(AtomicBool::new(false));
        let flag = opened.clone();
        let source = h.source(None);
        let mut fl = FrameLoop::new(
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
                Ok(source)
            }),
            h.model.clone(),
            h.outputs.clone(),
            h.cancelled.clone(),
            Box::new(NullLoopLogger),
        );

        fl.tick().unwrap();
        assert!(!opened.load(Ordering::SeqCst));

        h.model.publish(Box::new(h.detector(None)));
        fl.tick().unwrap();
        assert!(opened.load(Ordering::SeqCst));
        assert_eq!(fl.state(), LoopState::Running);
    }

    #[test]
    fn test_one_inference_per_tick_and_no_tensor_leak() {
        let h = Harness::new();
        let mut fl = h.frame_loop(None);
        h.model.publish(Box::new(h.detector(None)));

        let ticks = 25;
        for _ in 0..ticks {
            assert_eq!(fl.tick().unwrap(), TickOutcome::Detected { faces: 1 });
        }

        assert_eq!(h.calls.load(Ordering::SeqCst), ticks);
        assert_eq!(h.pulls.load(Ordering::SeqCst), ticks);
        assert_eq!(h.tracker.allocated(), ticks);
        assert_eq!(h.tracker.live(), 0);
        // Never more than the current frame's tensor alive during inference
        assert_eq!(h.live_during_call.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_result_replaced_each_tick() {
        let h = Harness::new();
        let mut fl = h.frame_loop(None);
        h.model.publish(Box::new(h.detector(None)));

        fl.tick().unwrap();
        fl.tick().unwrap();
        fl.tick().unwrap();

        let latest = h.outputs.results.latest().unwrap();
        assert_eq!(latest.len(), 1);
        // Third frame pulled has sequence 2
        assert_eq!(latest.first().unwrap().top_left.x, 2.0);
        assert_eq!(h.outputs.results.version(), 3);
        assert_eq!(h.outputs.previews.latest().unwrap().sequence(), 2);
    }

    #[test]
    fn test_detector_error_releases_tensor_and_ends_loop() {
        let h = Harness::new();
        let mut fl = h.frame_loop(None);
        h.model.publish(Box::new(h.detector(Some(2))));

        let result = fl.run(&mut ImmediateTicker);

        assert!(matches!(result, Err(FrameLoopError::Detection(ref m)) if m.contains("exploded")));
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.tracker.allocated(), 3);
        assert_eq!(h.tracker.live(), 0);
        // The failing frame never replaced the last good result
        assert_eq!(h.outputs.results.version(), 2);
    }

    #[test]
    fn test_camera_error_ends_loop() {
        let h = Harness::new();
        let mut fl = h.frame_loop(Some(1));
        h.model.publish(Box::new(h.detector(None)));

        let result = fl.run(&mut ImmediateTicker);

        assert!(matches!(result, Err(FrameLoopError::Camera(CameraError::Capture(_)))));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.tracker.live(), 0);
    }

    #[test]
    fn test_failed_open_closes_loop() {
        let h = Harness::new();
        let mut fl = FrameLoop::new(
            Box::new(|| {
                Err(CameraError::Open {
                    device: 3,
                    reason: "busy".into(),
                })
            }),
            h.model.clone(),
            h.outputs.clone(),
            h.cancelled.clone(),
            Box::new(NullLoopLogger),
        );
        h.model.publish(Box::new(h.detector(None)));

        assert!(matches!(fl.tick(), Err(FrameLoopError::Camera(CameraError::Open { .. }))));
        assert_eq!(fl.state(), LoopState::Closed);
        assert_eq!(fl.tick().unwrap(), TickOutcome::Stopped);
    }

    #[test]
    fn test_cancellation_checked_at_top_of_tick() {
        let h = Harness::new();
        let mut fl = h.frame_loop(None);
        let mut detector = h.detector(None);
        detector.cancel_at = Some((4, h.cancelled.clone()));
        h.model.publish(Box::new(detector));

        fl.run(&mut ImmediateTicker).unwrap();

        assert_eq!(h.calls.load(Ordering::SeqCst), 5);
        assert_eq!(h.tracker.live(), 0);
        assert_eq!(fl.tick().unwrap(), TickOutcome::Stopped);
    }

    #[test]
    fn test_spawned_loop_runs_until_cancelled() {
        let h = Harness::new();
        let tracker = h.tracker.clone();
        let pulls = h.pulls.clone();
        let handle = spawn(
            Box::new(move || {
                Ok(Box::new(CountingSource {
                    tracker,
                    pulls,
                    fail_at: None,
                }) as Box<dyn FrameSource>)
            }),
            h.model.clone(),
            h.outputs.clone(),
            Box::new(NullLoopLogger),
            Box::new(ImmediateTicker),
        );

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);

        h.model.publish(Box::new(h.detector(None)));
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.outputs.results.version() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        handle.cancel();
        handle.join().unwrap();
        assert!(h.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(h.tracker.live(), 0);
    }
}
