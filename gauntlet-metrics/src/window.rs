use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

fn new_latency_histogram() -> Histogram<u64> {
    // Microseconds, up to 10 minutes.
    match Histogram::<u64>::new_with_bounds(1, 600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

/// Counters for one sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowSnapshot {
    pub requests: u64,
    pub failures: u64,
    /// Mean latency of successful requests in milliseconds.
    pub mean_latency_ms: f64,
}

impl WindowSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.failures as f64 / self.requests as f64 * 100.0
    }
}

/// Request counters that concurrent sessions write into and a sampler drains
/// once per interval.
#[derive(Debug)]
pub struct LiveWindow {
    requests: AtomicU64,
    failures: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
}

impl Default for LiveWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveWindow {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            latency_us: Mutex::new(new_latency_histogram()),
        }
    }

    pub fn record_success(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX).max(1);
        let mut h = self.latency_us.lock();
        let high = h.high();
        let _ = h.record(us.min(high));
    }

    pub fn record_failure(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the counters accumulated since the previous call and resets them.
    pub fn take_window(&self) -> WindowSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let failures = self.failures.swap(0, Ordering::Relaxed);
        let mut h = self.latency_us.lock();
        let mean_latency_ms = if h.is_empty() { 0.0 } else { h.mean() / 1000.0 };
        h.reset();

        WindowSnapshot {
            requests,
            failures,
            mean_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_window_drains_counters() {
        let w = LiveWindow::new();
        w.record_success(Duration::from_millis(100));
        w.record_success(Duration::from_millis(300));
        w.record_failure();

        let snap = w.take_window();
        assert_eq!(snap.requests, 3);
        assert_eq!(snap.failures, 1);
        assert!((snap.mean_latency_ms - 200.0).abs() < 1.0);
        assert!((snap.error_rate() - 100.0 / 3.0).abs() < 1e-9);

        let empty = w.take_window();
        assert_eq!(empty, WindowSnapshot::default());
    }

    #[test]
    fn latency_past_the_histogram_range_is_clamped() {
        let w = LiveWindow::new();
        w.record_success(Duration::from_secs(3600));

        let snap = w.take_window();
        assert_eq!(snap.requests, 1);
        // Clamped to the 10 minute ceiling, within histogram precision.
        assert!((snap.mean_latency_ms - 600_000.0).abs() < 600.0, "{}", snap.mean_latency_ms);
    }
}
