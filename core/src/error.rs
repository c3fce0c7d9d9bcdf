//! Error types for boom-core
//!
//! Failures fall into four families:
//!
//! - [`ConfigError`]: the run is rejected before anything is dispatched
//! - [`ConstructionError`]: one request could not be built; recorded on its sample
//! - [`TransportError`]: one round trip failed; recorded on its sample
//! - [`AggregationError`]: the collected samples cannot produce a report
//!
//! Only configuration and aggregation errors ever reach the caller as `Err`.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::metrics::AggregationError;
pub use crate::target::ConstructionError;
pub use crate::transport::TransportError;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Aggregation error
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Engine lifecycle error
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Create an engine lifecycle error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Whether the error was raised before any request was dispatched
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::ZeroRate.into();
        assert!(err.is_config());
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_aggregation_error_converts() {
        let err: Error = AggregationError::NoSamples.into();
        assert!(!err.is_config());
        assert!(err.to_string().contains("no samples"));
    }
}
