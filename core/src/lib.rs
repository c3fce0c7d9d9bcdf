//! boom-core: HTTP load generation engine
//!
//! This crate provides the building blocks of a load run:
//!
//! - Request targets and their per-dispatch materialization
//! - Workers executing round trips through a pluggable transport
//! - The dispatch engine (fixed-count and paced modes, elastic pool growth)
//! - Statistics aggregation into a report
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod sample;
pub mod target;
pub mod transport;
pub mod worker;

pub use config::{DispatchPlan, EngineConfig, TlsPolicy};
pub use engine::{DispatchSummary, Engine, EngineBuilder, EngineState, SampleStream, StopHandle};
pub use error::*;
pub use metrics::{LatencyPercentiles, Report, ServerInfo, StatisticsAggregator};
pub use sample::Sample;
pub use target::{Cookie, Method, RequestTarget, RequestTargetBuilder};
pub use transport::{Exchange, ReqwestTransport, Transport};
pub use worker::{Worker, WorkerStats};
