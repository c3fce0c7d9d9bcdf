//! Builder pattern for Engine construction

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::transport::{ReqwestTransport, Transport};

use super::executor::Engine;

/// Builder for creating an Engine with proper configuration
///
/// # Example
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .pool_size(50)
///     .timeout(Duration::from_secs(5))
///     .build()?;
///
/// let mut samples = engine.launch(target, DispatchPlan::count(1000))?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl EngineBuilder {
    /// Create a new engine builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            transport: None,
        }
    }

    /// Set the full engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the initial pool size
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Cap elastic pool growth
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = Some(max_workers);
        self
    }

    /// Use a custom transport instead of building a reqwest client
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails or the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };

        Ok(Engine::new(self.config, transport))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
