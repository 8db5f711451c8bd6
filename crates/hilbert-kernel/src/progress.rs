//! Completeness reporting.
//!
//! Engines know how far they are; service calls do not. An engine
//! publishes into a [`ProgressTracker`] and whoever asks a call for its
//! percentage hands the tracker over as a [`Completeness`] capability for
//! that one query.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read side of an engine's progress.
pub trait Completeness: Send + Sync {
    /// Percentage of the work visited so far, in `0.0..=100.0`.
    fn visit_percentage(&self) -> f64;

    /// Human-readable description of the current position.
    fn location_description(&self) -> String;
}

/// Thread-safe progress cell written by one engine, read by anyone.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percentage_bits: AtomicU64,
    location: Mutex<String>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a percentage, clamped to `0.0..=100.0`.
    pub fn set_percentage(&self, percentage: f64) {
        let clamped = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 100.0)
        };
        self.percentage_bits
            .store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Store progress as `done` out of `total` units.
    pub fn set_fraction(&self, done: u64, total: u64) {
        if total == 0 {
            self.set_percentage(100.0);
        } else {
            self.set_percentage(done as f64 * 100.0 / total as f64);
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.lock() = location.into();
    }
}

impl Completeness for ProgressTracker {
    fn visit_percentage(&self) -> f64 {
        f64::from_bits(self.percentage_bits.load(Ordering::Relaxed))
    }

    fn location_description(&self) -> String {
        self.location.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_clamped() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.visit_percentage(), 0.0);
        tracker.set_percentage(140.0);
        assert_eq!(tracker.visit_percentage(), 100.0);
        tracker.set_fraction(1, 4);
        assert_eq!(tracker.visit_percentage(), 25.0);
        tracker.set_fraction(0, 0);
        assert_eq!(tracker.visit_percentage(), 100.0);
    }

    #[test]
    fn location_round_trips() {
        let tracker = ProgressTracker::new();
        tracker.set_location("proposition thm1, line 3");
        assert_eq!(tracker.location_description(), "proposition thm1, line 3");
    }
}
