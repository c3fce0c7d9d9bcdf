//! Engine execution logic

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use flume::TrySendError;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, DispatchPlan, EngineConfig};
use crate::error::{Error, Result};
use crate::sample::{Dispatch, RunClock, Sample};
use crate::target::RequestTarget;
use crate::transport::Transport;
use crate::worker::{Worker, WorkerStats};

use super::pacer::Pacer;

/// Lifecycle of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Not launched yet
    Idle,
    /// Generator is dispatching
    Running,
    /// Dispatching is over; in-flight requests are finishing
    Draining,
    /// Every worker has exited and the sample stream is closed
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Draining => "draining",
            EngineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the generator did during a run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    /// Dispatch instants handed to workers
    pub dispatched: u64,
    /// Workers started, initial pool included
    pub workers: usize,
    /// Merged statistics of every worker
    pub stats: WorkerStats,
    /// Time from launch until the last worker exited
    pub elapsed: Duration,
}

/// Cloneable handle that stops a running engine from any task
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Stop dispatching; calling this more than once has no further effect
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::info!("Engine will stop");
        }
        self.cancel.cancel();
    }

    /// Whether stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Engine drives one load run
///
/// It owns the shared transport and pool configuration, spawns the dispatch
/// generator on [`launch`](Engine::launch), and exposes cooperative
/// cancellation through [`stop`](Engine::stop).
pub struct Engine {
    /// Pool and client configuration
    pub(crate) config: EngineConfig,

    /// Transport (shared across workers)
    pub(crate) transport: Arc<dyn Transport>,

    /// Stop signal
    pub(crate) stop: StopHandle,

    /// Lifecycle state
    pub(crate) state_tx: Arc<watch::Sender<EngineState>>,
}

impl Engine {
    /// Create a new engine
    ///
    /// Use [`EngineBuilder`](super::EngineBuilder) for validated construction.
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let (state_tx, _) = watch::channel(EngineState::Idle);
        Self {
            config,
            transport,
            stop: StopHandle {
                cancel: CancellationToken::new(),
                stopped: Arc::new(AtomicBool::new(false)),
            },
            state_tx: Arc::new(state_tx),
        }
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state_tx.subscribe()
    }

    /// Handle for stopping the engine from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop dispatching
    ///
    /// Idempotent. In-flight requests complete and their samples are still
    /// delivered. Stopping before [`launch`](Engine::launch) makes the run
    /// dispatch nothing.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Start the run and return the stream of samples
    ///
    /// Must be called from within a tokio runtime. The stream ends once every
    /// worker has exited; dropping it stops the run early.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid plan or when the engine
    /// has already been launched.
    pub fn launch(
        &self,
        target: impl Into<Arc<RequestTarget>>,
        plan: DispatchPlan,
    ) -> Result<SampleStream> {
        plan.validate()?;

        let launched = self.state_tx.send_if_modified(|state| {
            if *state == EngineState::Idle {
                *state = EngineState::Running;
                true
            } else {
                false
            }
        });
        if !launched {
            return Err(ConfigError::AlreadyLaunched.into());
        }

        let target = target.into();
        let (dispatch_tx, dispatch_rx) = flume::bounded(0);
        let (samples_tx, samples_rx) = flume::bounded(0);

        tracing::info!(
            method = %target.method(),
            url = target.url(),
            pool_size = self.config.pool_size,
            max_workers = ?self.config.max_workers,
            plan = ?plan,
            "Launching"
        );

        let generator = Generator {
            target,
            transport: Arc::clone(&self.transport),
            clock: RunClock::start(),
            plan,
            pool_size: self.config.pool_size,
            max_workers: self.config.max_workers,
            cancel: self.stop.cancel.clone(),
            state_tx: Arc::clone(&self.state_tx),
            dispatch_tx,
            dispatch_rx: Some(dispatch_rx),
            samples_tx,
            workers: JoinSet::new(),
            spawned: 0,
        };

        let handle = tokio::spawn(generator.run());

        Ok(SampleStream {
            samples: samples_rx.into_stream().boxed(),
            generator: handle,
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Sample Stream
// ============================================================================

/// Single-pass stream of samples in completion order
pub struct SampleStream {
    samples: BoxStream<'static, Sample>,
    generator: JoinHandle<DispatchSummary>,
}

impl SampleStream {
    /// Receive the next sample, `None` once the run is over
    pub async fn recv(&mut self) -> Option<Sample> {
        self.samples.next().await
    }

    /// Append every remaining sample to `buf`, returning how many were added
    pub async fn drain_into(&mut self, buf: &mut Vec<Sample>) -> usize {
        let before = buf.len();
        while let Some(sample) = self.samples.next().await {
            buf.push(sample);
        }
        buf.len() - before
    }

    /// Wait for the generator and return its summary
    ///
    /// Samples not yet received are discarded, which stops a run still in
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the generator task panicked.
    pub async fn summary(self) -> Result<DispatchSummary> {
        let SampleStream { samples, generator } = self;
        drop(samples);
        generator
            .await
            .map_err(|e| Error::engine(format!("dispatch generator failed: {e}")))
    }
}

impl Stream for SampleStream {
    type Item = Sample;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.samples.poll_next_unpin(cx)
    }
}

impl fmt::Debug for SampleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStream")
            .field("finished", &self.generator.is_finished())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Dispatch loop of one run; owns every worker it starts
struct Generator {
    target: Arc<RequestTarget>,
    transport: Arc<dyn Transport>,
    clock: RunClock,
    plan: DispatchPlan,
    pool_size: usize,
    max_workers: Option<usize>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<EngineState>>,
    dispatch_tx: flume::Sender<Dispatch>,
    /// Kept for binding new workers; dropped once the pool can no longer grow
    dispatch_rx: Option<flume::Receiver<Dispatch>>,
    samples_tx: flume::Sender<Sample>,
    workers: JoinSet<WorkerStats>,
    spawned: usize,
}

impl Generator {
    async fn run(mut self) -> DispatchSummary {
        for _ in 0..self.pool_size {
            self.spawn_worker();
        }

        let dispatched = match self.plan {
            DispatchPlan::Count { total_hits } => self.run_count(total_hits).await,
            DispatchPlan::Rate { .. } => match Pacer::for_plan(Instant::now(), &self.plan) {
                Some(pacer) => self.run_rate(pacer).await,
                None => 0,
            },
        };

        self.state_tx.send_replace(EngineState::Draining);
        tracing::debug!(
            dispatched,
            workers = self.spawned,
            cancelled = self.cancel.is_cancelled(),
            "Dispatch finished, draining workers"
        );

        // Closing the dispatch channel lets every worker run out
        drop(self.dispatch_tx);
        drop(self.dispatch_rx.take());

        let mut stats = WorkerStats::new();
        while let Some(result) = self.workers.join_next().await {
            match result {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(e) => tracing::error!(error = %e, "Worker task panicked"),
            }
        }

        // Last sender gone: the sample stream ends
        drop(self.samples_tx);
        self.state_tx.send_replace(EngineState::Closed);

        let elapsed = self.clock.began().elapsed();
        tracing::info!(
            dispatched,
            workers = self.spawned,
            hits = stats.hits,
            failures = stats.failures,
            success_rate = stats.success_rate(),
            bytes = stats.bytes_transferred(),
            requests_per_second = stats.requests_per_second(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Run completed"
        );

        DispatchSummary {
            dispatched,
            workers: self.spawned,
            stats,
            elapsed,
        }
    }

    /// Fire `total` instants as fast as workers take them
    async fn run_count(&mut self, total: u64) -> u64 {
        let mut done = 0;
        while done < total {
            if !self.push(done, None).await {
                break;
            }
            done += 1;
        }
        done
    }

    /// Fire instants at the pacer's ideal times
    async fn run_rate(&mut self, pacer: Pacer) -> u64 {
        let mut done = 0;
        while done < pacer.total() {
            let ideal = pacer.ideal(done);

            let wait = pacer.wait(done, Instant::now());
            if !wait.is_zero() {
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => break,

                    _ = tokio::time::sleep(wait) => {}
                }
            } else {
                let lag = pacer.lag(done, Instant::now());
                if lag > pacer.interval() {
                    tracing::trace!(
                        sequence = done,
                        lag_ms = lag.as_millis() as u64,
                        "Behind schedule, dispatching immediately"
                    );
                }
            }

            if !self.push(done, Some(ideal)).await {
                break;
            }
            done += 1;
        }
        done
    }

    /// Hand one instant to an idle worker, growing the pool while none is idle
    ///
    /// Returns `false` when the run must end: stop was requested, the sample
    /// consumer is gone, or no worker remains.
    async fn push(&mut self, sequence: u64, ideal: Option<Instant>) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if self.samples_tx.is_disconnected() {
                tracing::debug!(sequence, "Sample stream dropped, stopping dispatch");
                return false;
            }

            let now = Instant::now();
            let dispatch = Dispatch {
                sequence,
                scheduled: ideal.map_or(now, |ideal| ideal.max(now)),
            };

            match self.dispatch_tx.try_send(dispatch) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(dispatch)) => {
                    if self.can_grow() {
                        self.spawn_worker();
                        tokio::task::yield_now().await;
                        continue;
                    }

                    // Growth cap reached: wait for a worker to free up
                    drop(self.dispatch_rx.take());
                    return tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => false,

                        sent = self.dispatch_tx.send_async(dispatch) => sent.is_ok(),
                    };
                }
            }
        }
    }

    fn can_grow(&self) -> bool {
        self.dispatch_rx.is_some() && self.max_workers.map_or(true, |max| self.spawned < max)
    }

    fn spawn_worker(&mut self) {
        let Some(dispatch_rx) = self.dispatch_rx.clone() else {
            return;
        };

        let worker = Worker::new(
            self.spawned,
            Arc::clone(&self.target),
            Arc::clone(&self.transport),
            self.clock,
            dispatch_rx,
            self.samples_tx.clone(),
        );
        self.workers.spawn(worker.run());
        self.spawned += 1;

        if self.spawned > self.pool_size {
            tracing::trace!(workers = self.spawned, "No idle worker, pool grown");
        }
    }
}
