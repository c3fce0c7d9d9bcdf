//! Per-request outcome records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one dispatched request
///
/// Every dispatch instant produces exactly one sample, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Index of the dispatch instant within the run, starting at 0
    pub sequence: u64,

    /// When the request was scheduled to go out
    pub timestamp: DateTime<Utc>,

    /// When the round trip started
    pub started_at: DateTime<Utc>,

    /// When the response head arrived or the request failed
    pub ended_at: DateTime<Utc>,

    /// Round trip latency (`ended_at - started_at`)
    pub latency: Duration,

    /// Response status, 0 when no response was received
    pub status_code: u16,

    /// Body bytes sent
    pub bytes_sent: u64,

    /// Body bytes received
    pub bytes_received: u64,

    /// Failure reason, `None` on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sample {
    /// Whether the request failed
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Total bytes moved in both directions
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_sent + self.bytes_received
    }
}

/// One dispatch instant handed from the generator to a worker
#[derive(Debug, Clone, Copy)]
pub struct Dispatch {
    /// Index of the instant within the run
    pub sequence: u64,
    /// Monotonic instant the request is due
    pub scheduled: Instant,
}

/// Maps monotonic instants of one run onto wall-clock time
///
/// Durations are always measured on the monotonic clock; wall time is only
/// derived from the anchor, so clock adjustments during a run never skew
/// latencies or throughput.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    began: Instant,
    began_wall: DateTime<Utc>,
}

impl RunClock {
    /// Anchor the clock at the current instant
    pub fn start() -> Self {
        Self {
            began: Instant::now(),
            began_wall: Utc::now(),
        }
    }

    /// Monotonic anchor
    pub fn began(&self) -> Instant {
        self.began
    }

    /// Wall-clock anchor
    pub fn began_wall(&self) -> DateTime<Utc> {
        self.began_wall
    }

    /// Wall-clock time of a monotonic instant
    pub fn wall(&self, instant: Instant) -> DateTime<Utc> {
        let offset = instant.saturating_duration_since(self.began);
        self.began_wall + chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::zero())
    }

    /// Wall-clock time now
    pub fn now(&self) -> DateTime<Utc> {
        self.wall(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(error: Option<&str>) -> Sample {
        let now = Utc::now();
        Sample {
            sequence: 0,
            timestamp: now,
            started_at: now,
            ended_at: now,
            latency: Duration::from_millis(5),
            status_code: 200,
            bytes_sent: 10,
            bytes_received: 32,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_sample_outcome() {
        assert!(sample(None).is_success());
        assert!(sample(Some("503 Service Unavailable")).is_failure());
        assert_eq!(sample(None).bytes_transferred(), 42);
    }

    #[test]
    fn test_sample_serialization_skips_empty_error() {
        let json = serde_json::to_string(&sample(None)).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"status_code\":200"));

        let failed = sample(Some("timeout"));
        let json = serde_json::to_string(&failed).unwrap();
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_clock_follows_monotonic_time() {
        let clock = RunClock::start();
        tokio::time::advance(Duration::from_millis(250)).await;

        let later = clock.now();
        assert_eq!(
            (later - clock.began_wall()).num_milliseconds(),
            250
        );
        assert_eq!(clock.wall(clock.began()), clock.began_wall());
    }
}
