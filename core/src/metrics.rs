//! Report aggregation
//!
//! [`StatisticsAggregator`] reduces the samples of one run into a
//! [`Report`]. Samples may be passed in any order; they normally arrive in
//! completion order.

use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Server under test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Target URL
    pub url: String,
    /// Host name (an explicit `Host` header wins over the URL host)
    pub host: String,
    /// Destination port
    pub port: u16,
}

/// Errors raised when samples cannot be reduced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    /// Nothing was collected
    #[error("no samples to aggregate")]
    NoSamples,

    /// Last completion is not after the first dispatch
    #[error("no time elapsed between the first dispatch and the last completion")]
    ZeroElapsed,
}

/// Latency percentiles (all values in seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyPercentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from ascending values
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p50: percentile(sorted, 0.50),
            p90: percentile(sorted, 0.90),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
        }
    }
}

/// Calculate percentile from sorted values using linear interpolation
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Summary of one run
///
/// Times are in seconds, rates per second, sizes in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Server under test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerInfo>,

    /// Initial worker pool size
    pub concurrency_level: usize,

    /// From the first dispatch to the last completion
    pub time_taken: f64,

    /// Samples collected, failures included
    pub completed_requests: usize,

    /// Samples carrying an error
    pub failed_requests: usize,

    /// `(completed - failed) / completed`
    pub success_rate: f64,

    /// Body bytes sent
    pub total_sent_bytes: u64,

    /// Body bytes received
    pub total_received_bytes: u64,

    /// Sent plus received
    pub total_transferred: u64,

    /// `completed / time_taken`
    pub requests_per_second: f64,

    /// `time_taken / (completed / concurrency_level)`
    pub time_per_request: f64,

    /// `time_taken / completed`
    pub time_per_request_concurrency: f64,

    /// `total_transferred / time_taken`
    pub transfer_rate: f64,

    /// Fastest round trip
    pub min_latency: f64,

    /// Slowest round trip
    pub max_latency: f64,

    /// Mean round trip
    pub mean_latency: f64,

    /// Round trip percentiles
    pub latency_percentiles: LatencyPercentiles,

    /// Samples per response status; 0 counts requests without a response
    pub status_codes: BTreeMap<u16, usize>,

    /// Samples per failure reason
    pub errors: BTreeMap<String, usize>,
}

/// Reduces samples into a [`Report`]
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    concurrency_level: usize,
    server: Option<ServerInfo>,
}

impl StatisticsAggregator {
    /// Create an aggregator for a run with the given initial pool size
    pub fn new(concurrency_level: usize) -> Self {
        Self {
            concurrency_level: concurrency_level.max(1),
            server: None,
        }
    }

    /// Attach the server description to the report
    pub fn with_server(mut self, server: ServerInfo) -> Self {
        self.server = Some(server);
        self
    }

    /// Reduce samples into a report
    ///
    /// # Errors
    ///
    /// [`AggregationError::NoSamples`] for an empty slice and
    /// [`AggregationError::ZeroElapsed`] when the last completion is not
    /// after the first dispatch.
    pub fn reduce(&self, samples: &[Sample]) -> Result<Report, AggregationError> {
        let first = samples.first().ok_or(AggregationError::NoSamples)?;

        let mut failed = 0usize;
        let mut total_sent = 0u64;
        let mut total_received = 0u64;
        let mut total_latency = 0f64;
        let mut first_dispatch = first.timestamp;
        let mut last_completion = first.ended_at;
        let mut latencies: Vec<Duration> = Vec::with_capacity(samples.len());
        let mut status_codes: BTreeMap<u16, usize> = BTreeMap::new();
        let mut errors: BTreeMap<String, usize> = BTreeMap::new();

        for sample in samples {
            if let Some(reason) = &sample.error {
                failed += 1;
                *errors.entry(reason.clone()).or_default() += 1;
            }
            *status_codes.entry(sample.status_code).or_default() += 1;
            total_sent += sample.bytes_sent;
            total_received += sample.bytes_received;
            total_latency += sample.latency.as_secs_f64();
            first_dispatch = first_dispatch.min(sample.timestamp);
            last_completion = last_completion.max(sample.ended_at);
            latencies.push(sample.latency);
        }

        for (reason, count) in &errors {
            tracing::warn!(reason = %reason, count, "Requests failed");
        }

        let elapsed = (last_completion - first_dispatch)
            .to_std()
            .ok()
            .filter(|elapsed| !elapsed.is_zero())
            .ok_or(AggregationError::ZeroElapsed)?;

        latencies.sort_unstable();
        let sorted_secs: Vec<f64> = latencies.iter().map(Duration::as_secs_f64).collect();

        let completed = samples.len();
        let time_taken = elapsed.as_secs_f64();
        let total_transferred = total_sent + total_received;
        let concurrency = self.concurrency_level as f64;

        Ok(Report {
            server: self.server.clone(),
            concurrency_level: self.concurrency_level,
            time_taken,
            completed_requests: completed,
            failed_requests: failed,
            success_rate: (completed - failed) as f64 / completed as f64,
            total_sent_bytes: total_sent,
            total_received_bytes: total_received,
            total_transferred,
            requests_per_second: completed as f64 / time_taken,
            time_per_request: time_taken / (completed as f64 / concurrency),
            time_per_request_concurrency: time_taken / completed as f64,
            transfer_rate: total_transferred as f64 / time_taken,
            min_latency: sorted_secs[0],
            max_latency: sorted_secs[sorted_secs.len() - 1],
            mean_latency: total_latency / completed as f64,
            latency_percentiles: LatencyPercentiles::from_sorted(&sorted_secs),
            status_codes,
            errors,
        })
    }
}
