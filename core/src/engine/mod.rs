//! Engine for load run lifecycle management
//!
//! The Engine coordinates one run:
//! - Generating dispatch instants (fixed count or paced rate)
//! - Starting workers and growing the pool when none is idle
//! - Cooperative cancellation via a cancellation token
//! - Draining in-flight requests and closing the sample stream
//!
//! # Example
//!
//! ```ignore
//! use boom_core::{DispatchPlan, EngineBuilder};
//!
//! let engine = EngineBuilder::new().pool_size(10).build()?;
//! let mut stream = engine.launch(target, DispatchPlan::count(1000))?;
//!
//! let mut samples = Vec::new();
//! stream.drain_into(&mut samples).await;
//! let summary = stream.summary().await?;
//! ```

mod builder;
mod executor;
mod pacer;

pub use builder::EngineBuilder;
pub use executor::{DispatchSummary, Engine, EngineState, SampleStream, StopHandle};
pub use pacer::Pacer;
