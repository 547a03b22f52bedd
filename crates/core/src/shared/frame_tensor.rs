use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::ArrayView3;

use crate::shared::frame::Frame;

/// Counts frame tensors that have been allocated but not yet released.
///
/// Cloning shares the counters, so a frame source and a test can observe
/// the same tally.
#[derive(Clone, Debug, Default)]
pub struct TensorTracker {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    allocated: AtomicUsize,
}

impl TensorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a resized frame into a tracked tensor.
    pub fn track(&self, frame: Frame) -> FrameTensor {
        self.counters.live.fetch_add(1, Ordering::AcqRel);
        self.counters.allocated.fetch_add(1, Ordering::AcqRel);
        FrameTensor {
            frame,
            _lease: Lease {
                counters: self.counters.clone(),
            },
        }
    }

    /// Tensors currently held somewhere.
    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::Acquire)
    }

    /// Tensors handed out since the tracker was created.
    pub fn allocated(&self) -> usize {
        self.counters.allocated.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Lease {
    counters: Arc<Counters>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One camera frame resized to the detector input resolution.
///
/// Exclusively owned by the loop iteration that pulled it. Dropping the
/// tensor releases its backing buffer and its tracker lease, on every path.
#[derive(Debug)]
pub struct FrameTensor {
    frame: Frame,
    _lease: Lease,
}

impl FrameTensor {
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn depth(&self) -> u8 {
        self.frame.channels()
    }

    pub fn sequence(&self) -> u64 {
        self.frame.sequence()
    }

    pub fn as_frame(&self) -> &Frame {
        &self.frame
    }

    /// `(height, width, depth)` view of the pixel values.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        self.frame.as_ndarray()
    }

    /// Explicitly release the tensor. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}
