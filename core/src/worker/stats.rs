//! Worker statistics tracking

use crate::sample::Sample;
use serde::Serialize;
use std::time::Instant;

/// Statistics tracked by each worker
#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkerStats {
    /// Number of samples produced
    pub hits: usize,

    /// Number of samples carrying an error
    pub failures: usize,

    /// Body bytes sent
    pub bytes_sent: u64,

    /// Body bytes received
    pub bytes_received: u64,

    /// Worker start time
    #[serde(skip)]
    pub started_at: Option<Instant>,

    /// Worker end time
    #[serde(skip)]
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Number of successful hits
    pub fn successes(&self) -> usize {
        self.hits - self.failures
    }

    /// Get success rate as a fraction (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.successes() as f64 / self.hits as f64
        }
    }

    /// Total bytes in both directions
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_sent + self.bytes_received
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Get hits per second
    pub fn requests_per_second(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.hits as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }

    /// Record one sample
    pub fn record(&mut self, sample: &Sample) {
        self.hits += 1;
        if sample.is_failure() {
            self.failures += 1;
        }
        self.bytes_sent += sample.bytes_sent;
        self.bytes_received += sample.bytes_received;
    }

    /// Merge stats from another worker
    ///
    /// The merged window spans the earliest start and the latest end.
    pub fn merge(&mut self, other: &WorkerStats) {
        self.hits += other.hits;
        self.failures += other.failures;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.started_at = match (self.started_at, other.started_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.ended_at = match (self.ended_at, other.ended_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn sample(sent: u64, received: u64, error: Option<&str>) -> Sample {
        let now = Utc::now();
        Sample {
            sequence: 0,
            timestamp: now,
            started_at: now,
            ended_at: now,
            latency: Duration::from_millis(1),
            status_code: if error.is_some() { 500 } else { 200 },
            bytes_sent: sent,
            bytes_received: received,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_worker_stats_defaults() {
        let stats = WorkerStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.bytes_transferred(), 0);
        assert!(stats.started_at.is_none());
        assert!(stats.ended_at.is_none());
    }

    #[test]
    fn test_worker_stats_record() {
        let mut stats = WorkerStats::new();
        stats.record(&sample(10, 100, None));
        stats.record(&sample(10, 0, Some("500 Internal Server Error")));

        assert_eq!(stats.hits, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes(), 1);
        assert_eq!(stats.bytes_sent, 20);
        assert_eq!(stats.bytes_received, 100);
        assert_eq!(stats.bytes_transferred(), 120);
    }

    #[test]
    fn test_worker_stats_success_rate() {
        let mut stats = WorkerStats::new();
        stats.hits = 10;
        stats.failures = 2;
        assert!((stats.success_rate() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_worker_stats_success_rate_zero_hits() {
        let stats = WorkerStats::new();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.requests_per_second(), 0.0);
    }

    #[test]
    fn test_worker_stats_merge() {
        let mut stats1 = WorkerStats::new();
        stats1.hits = 10;
        stats1.failures = 1;
        stats1.bytes_sent = 1000;
        stats1.bytes_received = 500;

        let mut stats2 = WorkerStats::new();
        stats2.hits = 5;
        stats2.failures = 2;
        stats2.bytes_sent = 500;
        stats2.bytes_received = 250;

        stats1.merge(&stats2);

        assert_eq!(stats1.hits, 15);
        assert_eq!(stats1.failures, 3);
        assert_eq!(stats1.bytes_sent, 1500);
        assert_eq!(stats1.bytes_received, 750);
    }

    #[test]
    fn test_worker_stats_merge_widens_window() {
        let mut first = WorkerStats::new();
        first.start();
        std::thread::sleep(Duration::from_millis(5));

        let mut second = WorkerStats::new();
        second.start();
        second.stop();
        std::thread::sleep(Duration::from_millis(5));
        first.stop();

        let mut merged = WorkerStats::new();
        merged.merge(&second);
        merged.merge(&first);

        assert_eq!(merged.started_at, first.started_at);
        assert_eq!(merged.ended_at, first.ended_at);
    }

    #[test]
    fn test_worker_stats_start_stop() {
        let mut stats = WorkerStats::new();
        assert!(stats.elapsed().is_none());

        stats.start();
        assert!(stats.started_at.is_some());
        assert!(stats.elapsed().is_some());

        std::thread::sleep(Duration::from_millis(10));
        stats.stop();

        let elapsed = stats.elapsed().unwrap();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
