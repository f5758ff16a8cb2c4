//! Fixed-window request counters, one per backend.
//!
//! A counter is zeroed and its reset mark advanced the first time it is
//! touched after the window has elapsed; resets are lazy and never
//! retroactive. A burst straddling a boundary can momentarily reach twice
//! the nominal rate, which is the accepted cost of skipping a sliding
//! window's bookkeeping.

use crate::types::RateWindowSnapshot;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const DAY_WINDOW: Duration = Duration::from_secs(86_400);

/// Static per-backend caps, taken from published third-party limits.
#[derive(Debug, Clone, Copy)]
pub struct RateCaps {
    pub per_minute: u32,
    pub per_day: u32,
}

#[derive(Debug)]
struct WindowState {
    minute_count: u32,
    minute_reset: Instant,
    day_count: u32,
    day_reset: Instant,
}

impl WindowState {
    fn tick(&mut self, now: Instant) {
        if now.saturating_duration_since(self.minute_reset) > MINUTE_WINDOW {
            self.minute_count = 0;
            self.minute_reset = now;
        }
        if now.saturating_duration_since(self.day_reset) > DAY_WINDOW {
            self.day_count = 0;
            self.day_reset = now;
        }
    }
}

/// Per-backend minute/day counters with lazy boundary resets.
#[derive(Debug)]
pub struct RateWindow {
    caps: RateCaps,
    state: Mutex<WindowState>,
}

impl RateWindow {
    pub fn new(caps: RateCaps) -> Self {
        let now = Instant::now();
        Self {
            caps,
            state: Mutex::new(WindowState {
                minute_count: 0,
                minute_reset: now,
                day_count: 0,
                day_reset: now,
            }),
        }
    }

    pub fn caps(&self) -> RateCaps {
        self.caps
    }

    /// Count one served request against both windows.
    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    pub fn is_limited(&self) -> bool {
        self.snapshot().is_limited
    }

    pub fn snapshot(&self) -> RateWindowSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn record_at(&self, now: Instant) {
        let mut state = self.state.lock();
        state.tick(now);
        state.minute_count += 1;
        state.day_count += 1;
    }

    fn snapshot_at(&self, now: Instant) -> RateWindowSnapshot {
        let mut state = self.state.lock();
        state.tick(now);
        RateWindowSnapshot {
            requests_per_minute: self.caps.per_minute,
            requests_per_day: self.caps.per_day,
            current_minute_usage: state.minute_count,
            current_day_usage: state.day_count,
            is_limited: state.minute_count >= self.caps.per_minute
                || state.day_count >= self.caps.per_day,
        }
    }
}
