use std::time::Instant;

/// Observer for frame loop events.
///
/// Keeps the loop free of output concerns: the CLI logs throughput, the
/// desktop shell and tests stay silent.
pub trait LoopLogger: Send {
    /// A tick passed while the model was still loading.
    fn idle_tick(&mut self);

    /// One inference finished.
    fn inference(&mut self, duration_ms: f64, faces: usize);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-loop summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullLoopLogger;

impl LoopLogger for NullLoopLogger {
    fn idle_tick(&mut self) {}
    fn inference(&mut self, _duration_ms: f64, _faces: usize) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger that reports throttled throughput through `log` and a summary
/// when the loop stops.
///
/// Keeps running totals only; the loop may run for the life of the process.
pub struct LogLoopLogger {
    throttle_frames: usize,
    frames: usize,
    total_ms: f64,
    max_ms: f64,
    frames_with_faces: usize,
    idle_ticks: usize,
    started: Option<Instant>,
}

impl LogLoopLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            frames: 0,
            total_ms: 0.0,
            max_ms: 0.0,
            frames_with_faces: 0,
            idle_ticks: 0,
            started: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn idle_ticks(&self) -> usize {
        self.idle_ticks
    }

    /// Returns the formatted summary string, or `None` if no frame was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 {
            return None;
        }

        let frames = self.frames;
        let total_ms = self.total_ms;
        let avg_ms = total_ms / frames as f64;
        let max_ms = self.max_ms;

        let mut lines = vec![
            format!("Frame loop summary ({frames} frames, {} idle ticks):", self.idle_ticks),
            format!("  inference: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"),
            format!("  frames with a face: {}", self.frames_with_faces),
        ];

        if let Some(started) = self.started {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                lines.push(format!("  Throughput: {:.1} fps", frames as f64 / elapsed));
            }
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogLoopLogger {
    fn default() -> Self {
        Self::new(60)
    }
}

impl LoopLogger for LogLoopLogger {
    fn idle_tick(&mut self) {
        self.idle_ticks += 1;
    }

    fn inference(&mut self, duration_ms: f64, faces: usize) {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.frames += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
        if faces > 0 {
            self.frames_with_faces += 1;
        }

        let frames = self.frames;
        if frames % self.throttle_frames == 0 {
            let secs = started.elapsed().as_secs_f64();
            let fps = if secs > 0.0 { frames as f64 / secs } else { 0.0 };
            log::info!("Processed {frames} frames ({fps:.1} fps), last inference {duration_ms:.1}ms, {faces} faces");
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
