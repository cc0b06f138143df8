//! Latency tracking for model round trips

use std::collections::VecDeque;
use std::time::Duration;

/// Sliding window of recent durations
#[derive(Debug, Clone)]
pub struct TimingTracker {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl TimingTracker {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().max().copied().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// One-line summary for logs and status displays
    pub fn summary(&self) -> String {
        format!(
            "{} samples, avg {}ms, max {}ms",
            self.count(),
            self.average().as_millis(),
            self.max().as_millis()
        )
    }
}

impl Default for TimingTracker {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut tracker = TimingTracker::new(2);
        tracker.record(Duration::from_millis(100));
        tracker.record(Duration::from_millis(200));
        tracker.record(Duration::from_millis(400));

        assert_eq!(tracker.count(), 2);
        assert_eq!(tracker.average(), Duration::from_millis(300));
        assert_eq!(tracker.max(), Duration::from_millis(400));
        assert_eq!(tracker.last(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = TimingTracker::default();
        assert_eq!(tracker.average(), Duration::ZERO);
        assert_eq!(tracker.last(), None);
        assert_eq!(tracker.summary(), "0 samples, avg 0ms, max 0ms");
    }
}
