use std::time::{Duration, Instant};

/// Paces the frame loop, standing in for the display refresh callback.
pub trait Ticker {
    /// Block until the next tick is due.
    fn wait_tick(&mut self);
}

/// Fixed-rate ticker. A tick that is already late fires immediately and the
/// schedule restarts from now, so missed ticks are dropped rather than
/// replayed in a burst.
pub struct IntervalTicker {
    period: Duration,
    next: Option<Instant>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn from_hz(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64))
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Ticker for IntervalTicker {
    fn wait_tick(&mut self) {
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
            self.next = Some(due + self.period);
        } else {
            self.next = Some(now + self.period);
        }
    }
}

/// Ticker that never waits. Used for still images and tests.
pub struct ImmediateTicker;

impl Ticker for ImmediateTicker {
    fn wait_tick(&mut self) {}
}
