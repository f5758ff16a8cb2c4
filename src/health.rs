//! Per-backend reliability score used as a lightweight circuit breaker.
//!
//! The score is a bounded integer in `[0, 100]` with asymmetric updates:
//! a success restores one point, a failure costs ten, so repeated failures
//! degrade availability much faster than successes rebuild it. There is no
//! time-based decay or half-open probe: an idle, previously-failing backend
//! regains score only through traffic that succeeds.

use std::sync::atomic::{AtomicU32, Ordering};

/// Score below or at which a backend is considered unavailable.
pub const HEALTH_THRESHOLD: u32 = 20;

const MAX_SCORE: u32 = 100;
const SUCCESS_STEP: u32 = 1;
const FAILURE_STEP: u32 = 10;

/// Bounded health score for one backend. Cheap to share across tasks;
/// updates are atomic and clamped.
#[derive(Debug)]
pub struct HealthTracker {
    score: AtomicU32,
}

impl HealthTracker {
    /// New tracker at full health.
    pub fn new() -> Self {
        Self {
            score: AtomicU32::new(MAX_SCORE),
        }
    }

    /// New tracker at a specific score, clamped to the valid range.
    pub fn with_score(score: u32) -> Self {
        Self {
            score: AtomicU32::new(score.min(MAX_SCORE)),
        }
    }

    pub fn record(&self, success: bool) {
        if success {
            self.record_success();
        } else {
            self.record_failure();
        }
    }

    pub fn record_success(&self) {
        let _ = self
            .score
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some((s + SUCCESS_STEP).min(MAX_SCORE))
            });
    }

    pub fn record_failure(&self) {
        let _ = self
            .score
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some(s.saturating_sub(FAILURE_STEP))
            });
    }

    pub fn score(&self) -> u32 {
        self.score.load(Ordering::Relaxed)
    }

    /// Whether the score is above the availability threshold.
    pub fn is_healthy(&self) -> bool {
        self.score() > HEALTH_THRESHOLD
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_full_health() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.score(), 100);
        assert!(tracker.is_healthy());
    }

    #[test]
    fn success_is_clamped_at_max() {
        let tracker = HealthTracker::new();
        tracker.record_success();
        tracker.record_success();
        assert_eq!(tracker.score(), 100);
    }

    #[test]
    fn failure_is_clamped_at_zero() {
        let tracker = HealthTracker::new();
        for _ in 0..20 {
            tracker.record_failure();
        }
        assert_eq!(tracker.score(), 0);
        tracker.record_failure();
        assert_eq!(tracker.score(), 0);
    }

    #[test]
    fn updates_are_asymmetric() {
        let tracker = HealthTracker::new();
        tracker.record_failure();
        assert_eq!(tracker.score(), 90);
        tracker.record_success();
        assert_eq!(tracker.score(), 91);
    }

    #[test]
    fn stays_in_range_for_arbitrary_sequences() {
        let tracker = HealthTracker::new();
        // Deterministic mixed sequence; the invariant must hold at every step.
        for i in 0..1000u32 {
            tracker.record(i % 3 == 0);
            let score = tracker.score();
            assert!(score <= 100, "score {score} out of range at step {i}");
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        let tracker = HealthTracker::with_score(21);
        assert!(tracker.is_healthy());
        tracker.record_failure();
        assert_eq!(tracker.score(), 11);
        assert!(!tracker.is_healthy());

        let at_threshold = HealthTracker::with_score(20);
        assert!(!at_threshold.is_healthy());
    }

    #[test]
    fn with_score_clamps_input() {
        assert_eq!(HealthTracker::with_score(250).score(), 100);
    }
}
