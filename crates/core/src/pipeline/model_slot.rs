use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::detection::domain::face_detector::FaceDetector;

/// Load-once hand-off of the detector from bootstrap to the frame loop.
///
/// Bootstrap publishes at most once; the loop takes the detector at most
/// once. `is_published` stays true after the take.
#[derive(Default)]
pub struct ModelSlot {
    detector: Mutex<Option<Box<dyn FaceDetector>>>,
    published: AtomicBool,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, dropping `detector`, if a model was already published.
    pub fn publish(&self, detector: Box<dyn FaceDetector>) -> bool {
        if self.published.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.detector.lock().unwrap_or_else(|e| e.into_inner()) = Some(detector);
        true
    }

    pub fn try_take(&self) -> Option<Box<dyn FaceDetector>> {
        if !self.published.load(Ordering::Acquire) {
            return None;
        }
        self.detector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }
}
