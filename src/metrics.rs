//! Loop throughput bookkeeping.

use std::collections::VecDeque;

/// Number of per-frame rate samples kept in the rolling window.
const WINDOW_CAPACITY: usize = 100;

/// Bounded moving average of loop throughput in frames per second.
///
/// The window holds one rate sample per recorded frame duration, with FIFO
/// eviction once full. The average is reported only; it is never used for
/// control decisions.
pub struct RollingFps {
    window: VecDeque<f64>,
}

impl RollingFps {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Record one frame duration in seconds. A non-positive duration carries
    /// no defined rate and is ignored.
    pub fn record(&mut self, duration_secs: f64) {
        if !(duration_secs > 0.0) {
            return;
        }
        if self.window.len() >= WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(1.0 / duration_secs);
    }

    /// Arithmetic mean of the current window; 0.0 while the window is empty.
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for RollingFps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_reports_zero() {
        let fps = RollingFps::new();
        assert_eq!(fps.average(), 0.0);
        assert!(fps.is_empty());
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut fps = RollingFps::new();
        for _ in 0..150 {
            fps.record(0.01);
        }
        assert_eq!(fps.len(), 100);
    }

    #[test]
    fn average_reflects_only_the_last_hundred_samples() {
        let mut fps = RollingFps::new();
        // 50 slow frames first, then 100 fast ones that must displace them.
        for _ in 0..50 {
            fps.record(1.0);
        }
        for _ in 0..100 {
            fps.record(0.1);
        }
        assert_eq!(fps.len(), 100);
        assert!((fps.average() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_is_ignored() {
        let mut fps = RollingFps::new();
        fps.record(0.0);
        fps.record(-1.0);
        assert!(fps.is_empty());
        fps.record(0.5);
        assert_eq!(fps.len(), 1);
        assert!((fps.average() - 2.0).abs() < 1e-9);
    }
}
