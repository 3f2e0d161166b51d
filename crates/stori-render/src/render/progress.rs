use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use atomic_float::AtomicF32;
use parking_lot::Mutex;

use crate::config::ETA_THRESHOLD;

/// Point-in-time view of a running export.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub fraction: f32,
    pub status: String,
    pub elapsed: Duration,
    /// Published once the render is past the estimate threshold.
    pub remaining: Option<Duration>,
}

/// Shared progress of one export. The capture loop only touches the atomic
/// fraction.
#[derive(Debug)]
pub struct RenderProgress {
    fraction: AtomicF32,
    status: Mutex<String>,
    started: Instant,
    finished: Mutex<Option<Duration>>,
}

impl RenderProgress {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            fraction: AtomicF32::new(0.0),
            status: Mutex::new(status.into()),
            started: Instant::now(),
            finished: Mutex::new(None),
        }
    }

    pub fn set_fraction(&self, fraction: f32) {
        self.fraction.store(fraction.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f32 {
        self.fraction.load(Ordering::Relaxed)
    }

    pub fn set_status(&self, status: impl Into<String>) {
        *self.status.lock() = status.into();
    }

    /// Freezes the elapsed time and records the final status.
    pub fn finish(&self, status: impl Into<String>) {
        self.finished.lock().get_or_insert_with(|| self.started.elapsed());
        self.set_status(status);
    }

    pub fn elapsed(&self) -> Duration {
        let finished = *self.finished.lock();
        finished.unwrap_or_else(|| self.started.elapsed())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let fraction = self.fraction();
        let elapsed = self.elapsed();
        ProgressSnapshot {
            fraction,
            status: self.status.lock().clone(),
            elapsed,
            remaining: estimate_remaining(fraction, elapsed),
        }
    }
}

/// Extrapolates the remaining wall-clock time from the elapsed time.
pub fn estimate_remaining(fraction: f32, elapsed: Duration) -> Option<Duration> {
    if fraction < ETA_THRESHOLD {
        return None;
    }
    if fraction >= 1.0 {
        return Some(Duration::ZERO);
    }
    let fraction = f64::from(fraction);
    Some(elapsed.mul_f64((1.0 - fraction) / fraction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_estimate_before_threshold() {
        assert_eq!(estimate_remaining(0.01, Duration::from_secs(3)), None);
        assert_eq!(
            estimate_remaining(0.25, Duration::from_secs(3)),
            Some(Duration::from_secs(9))
        );
        assert_eq!(estimate_remaining(1.0, Duration::from_secs(3)), Some(Duration::ZERO));
    }

    #[test]
    fn snapshot_reflects_updates() {
        let progress = RenderProgress::new("Preparing");
        progress.set_fraction(1.5);
        progress.set_status("Rendering");
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.fraction, 1.0);
        assert_eq!(snapshot.status, "Rendering");
        progress.finish("Done");
        let frozen = progress.elapsed();
        assert_eq!(progress.elapsed(), frozen);
    }
}
