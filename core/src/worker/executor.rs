//! Worker execution loop

use crate::sample::{Dispatch, RunClock, Sample};
use crate::target::RequestTarget;
use crate::transport::{is_success_status, status_line, Transport};

use super::stats::WorkerStats;

use std::sync::Arc;
use tokio::time::Instant;

/// Worker executes requests in a loop: receive -> hit -> report -> repeat
///
/// Workers are tokio tasks managed by the Engine. They share the
/// RequestTarget and Transport via Arc, receive dispatch instants from a
/// rendezvous channel and send samples through another.
pub struct Worker {
    /// Unique worker identifier
    id: usize,

    /// Endpoint under load (shared, read-only)
    target: Arc<RequestTarget>,

    /// Transport (shared across workers via Arc)
    transport: Arc<dyn Transport>,

    /// Run clock for wall-clock timestamps
    clock: RunClock,

    /// Dispatch instants from the generator
    dispatch_rx: flume::Receiver<Dispatch>,

    /// Samples to the consumer
    samples_tx: flume::Sender<Sample>,
}

impl Worker {
    /// Create a new worker bound to a run's channels
    pub fn new(
        id: usize,
        target: Arc<RequestTarget>,
        transport: Arc<dyn Transport>,
        clock: RunClock,
        dispatch_rx: flume::Receiver<Dispatch>,
        samples_tx: flume::Sender<Sample>,
    ) -> Self {
        Self {
            id,
            target,
            transport,
            clock,
            dispatch_rx,
            samples_tx,
        }
    }

    /// Run the worker loop
    ///
    /// Returns when the dispatch channel is closed and drained, or when the
    /// sample consumer has gone away.
    pub async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::new();
        stats.start();

        tracing::trace!(worker_id = self.id, "Worker started");

        while let Ok(dispatch) = self.dispatch_rx.recv_async().await {
            let sample = self.hit(dispatch).await;
            stats.record(&sample);

            if self.samples_tx.send_async(sample).await.is_err() {
                tracing::debug!(
                    worker_id = self.id,
                    "Sample channel closed, worker stopping"
                );
                break;
            }
        }

        stats.stop();
        tracing::trace!(
            worker_id = self.id,
            hits = stats.hits,
            failures = stats.failures,
            elapsed_ms = ?stats.elapsed().map(|d| d.as_millis()),
            "Worker finished"
        );

        stats
    }

    /// Execute one request for a dispatch instant
    ///
    /// Always yields a sample; construction, transport and status failures
    /// are recorded in its `error` field.
    pub async fn hit(&self, dispatch: Dispatch) -> Sample {
        let timestamp = self.clock.wall(dispatch.scheduled);

        let request = match self.target.materialize() {
            Ok(request) => request,
            Err(e) => {
                let now = self.clock.now();
                return Sample {
                    sequence: dispatch.sequence,
                    timestamp,
                    started_at: now,
                    ended_at: now,
                    latency: std::time::Duration::ZERO,
                    status_code: 0,
                    bytes_sent: 0,
                    bytes_received: 0,
                    error: Some(e.to_string()),
                };
            }
        };

        // Latency covers the round trip up to the response head
        let start = Instant::now();
        let result = self.transport.send(request).await;
        let end = Instant::now();

        let mut sample = Sample {
            sequence: dispatch.sequence,
            timestamp,
            started_at: self.clock.wall(start),
            ended_at: self.clock.wall(end),
            latency: end.duration_since(start),
            status_code: 0,
            bytes_sent: 0,
            bytes_received: 0,
            error: None,
        };

        let exchange = match result {
            Ok(exchange) => exchange,
            Err(e) => {
                sample.error = Some(e.to_string());
                return sample;
            }
        };

        let status = exchange.status();
        sample.status_code = status.as_u16();
        sample.bytes_sent = self.target.sent_bytes();

        match exchange.discard_body().await {
            Ok(received) => sample.bytes_received = received,
            Err(e) => {
                sample.error = Some(e.to_string());
                return sample;
            }
        }

        if !is_success_status(status) {
            sample.error = Some(status_line(status));
        }

        sample
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("method", &self.target.method())
            .field("url", &self.target.url())
            .finish()
    }
}
