//! Worker module for executing dispatched requests
//!
//! A Worker is the execution unit of a run, responsible for the loop:
//! **receive instant -> hit -> report -> repeat**.
//!
//! Each Worker is a tokio task that:
//!
//! 1. Waits for the next dispatch instant on the shared dispatch channel
//! 2. Materializes a fresh request from the shared RequestTarget
//! 3. Executes the round trip through the shared Transport
//! 4. Sends exactly one Sample to the sample channel
//! 5. Repeats until the dispatch channel closes
//!
//! Workers hold no per-run state besides their [`WorkerStats`], so the engine
//! can start more of them at any time while a run is in progress.
//!
//! # Example
//!
//! ```ignore
//! use boom_core::worker::Worker;
//!
//! let worker = Worker::new(0, target, transport, clock, dispatch_rx, samples_tx);
//! let stats = worker.run().await;
//! println!("Hits: {}", stats.hits);
//! ```

mod executor;
mod stats;

pub use executor::Worker;
pub use stats::WorkerStats;
