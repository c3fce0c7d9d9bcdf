//! Engine and dispatch configuration types

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of workers started before the first dispatch
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Default idle connections kept per host
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 100;

/// TLS handling handed through to the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsPolicy {
    /// Accept invalid or self-signed server certificates
    pub accept_invalid_certs: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
        }
    }
}

impl TlsPolicy {
    /// Verify server certificates normally
    pub fn strict() -> Self {
        Self {
            accept_invalid_certs: false,
        }
    }
}

/// Engine configuration
///
/// Describes the worker pool and the shared HTTP client. Everything except
/// `pool_size` and `max_workers` is consumed by the transport when the
/// client is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-request timeout enforced by the client
    pub timeout: Duration,

    /// Number of workers started before the first dispatch
    pub pool_size: usize,

    /// Idle connections kept per host when keep-alive is enabled
    pub max_idle_connections: usize,

    /// Reuse connections across requests
    pub keep_alive: bool,

    /// Local address outgoing connections bind to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_address: Option<IpAddr>,

    /// TLS handling
    pub tls: TlsPolicy,

    /// Allow HTTP/2 (otherwise HTTP/1.1 only)
    pub http2: bool,

    /// Redirect limit; `None` keeps the client's default policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,

    /// Upper bound on the elastically grown pool; `None` is unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            keep_alive: false,
            local_address: None,
            tls: TlsPolicy::default(),
            http2: false,
            max_redirects: None,
            max_workers: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the given initial pool size
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable connection reuse
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the idle connection limit per host
    pub fn with_max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = max;
        self
    }

    /// Bind outgoing connections to a local address
    pub fn with_local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Set the TLS policy
    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    /// Enable or disable HTTP/2
    pub fn with_http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    /// Limit redirects followed by the client
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Cap elastic pool growth
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = Some(max);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        if let Some(max_workers) = self.max_workers {
            if max_workers < self.pool_size {
                return Err(ConfigError::MaxWorkersBelowPool {
                    max_workers,
                    pool_size: self.pool_size,
                });
            }
        }

        Ok(())
    }
}

/// How dispatch instants are generated for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPlan {
    /// Fire exactly `total_hits` instants as fast as workers absorb them
    Count {
        /// Number of requests to send
        total_hits: u64,
    },

    /// Fire `per_second * duration` instants spaced `1 / per_second` apart
    Rate {
        /// Requests per second
        per_second: u32,
        /// How long to keep dispatching
        duration: Duration,
    },
}

impl DispatchPlan {
    /// Fixed-count plan
    pub fn count(total_hits: u64) -> Self {
        DispatchPlan::Count { total_hits }
    }

    /// Paced plan
    pub fn rate(per_second: u32, duration: Duration) -> Self {
        DispatchPlan::Rate {
            per_second,
            duration,
        }
    }

    /// Number of instants the plan dispatches when not cancelled
    pub fn total_instants(&self) -> u64 {
        match *self {
            DispatchPlan::Count { total_hits } => total_hits,
            DispatchPlan::Rate {
                per_second,
                duration,
            } => (per_second as f64 * duration.as_secs_f64()).round() as u64,
        }
    }

    /// Spacing between ideal instants, for paced plans
    pub fn interval(&self) -> Option<Duration> {
        match *self {
            DispatchPlan::Count { .. } => None,
            DispatchPlan::Rate { per_second, .. } if per_second > 0 => Some(Duration::from_nanos(
                1_000_000_000 / u64::from(per_second),
            )),
            DispatchPlan::Rate { .. } => None,
        }
    }

    /// Validate the plan
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            DispatchPlan::Count { total_hits } => {
                if total_hits == 0 {
                    return Err(ConfigError::ZeroHits);
                }
            }
            DispatchPlan::Rate {
                per_second,
                duration,
            } => {
                if per_second == 0 {
                    return Err(ConfigError::ZeroRate);
                }
                if duration.is_zero() {
                    return Err(ConfigError::ZeroDuration);
                }
                if self.total_instants() == 0 {
                    return Err(ConfigError::EmptyPlan {
                        per_second,
                        duration,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Target URL missing
    #[error("url must be set")]
    EmptyUrl,

    /// Target URL does not parse
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Header entry is not `name:value` or not a valid header
    #[error("invalid http header: {0}")]
    InvalidHeader(String),

    /// Cookie name or value rejected
    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    /// Pool size of zero
    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    /// Timeout of zero
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Growth cap below the initial pool
    #[error("max workers ({max_workers}) must not be below pool size ({pool_size})")]
    MaxWorkersBelowPool {
        /// Configured cap
        max_workers: usize,
        /// Configured initial pool
        pool_size: usize,
    },

    /// Zero request count
    #[error("total requests must be at least 1")]
    ZeroHits,

    /// Zero rate
    #[error("rate must be bigger than zero")]
    ZeroRate,

    /// Zero duration
    #[error("duration must be greater than zero")]
    ZeroDuration,

    /// Rate and duration round to no instants at all
    #[error("{per_second}/s over {duration:?} dispatches no requests")]
    EmptyPlan {
        /// Configured rate
        per_second: u32,
        /// Configured duration
        duration: Duration,
    },

    /// Engine already ran
    #[error("engine has already been launched")]
    AlreadyLaunched,

    /// HTTP client could not be built
    #[error("http client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_size, 100);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_idle_connections, 100);
        assert!(!config.keep_alive);
        assert!(!config.http2);
        assert!(config.tls.accept_invalid_certs);
        assert!(config.max_workers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = EngineConfig::new(8)
            .with_timeout(Duration::from_secs(5))
            .with_keep_alive(true)
            .with_http2(true)
            .with_max_workers(64)
            .with_tls(TlsPolicy::strict());

        assert_eq!(config.pool_size, 8);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.keep_alive);
        assert!(config.http2);
        assert_eq!(config.max_workers, Some(64));
        assert!(!config.tls.accept_invalid_certs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_pool() {
        let config = EngineConfig::new(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPoolSize));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let config = EngineConfig::new(1).with_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_config_validation_max_workers_below_pool() {
        let config = EngineConfig::new(10).with_max_workers(5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxWorkersBelowPool { .. })
        ));
    }

    #[test]
    fn test_plan_count() {
        let plan = DispatchPlan::count(250);
        assert_eq!(plan.total_instants(), 250);
        assert!(plan.interval().is_none());
        assert!(plan.validate().is_ok());
        assert_eq!(DispatchPlan::count(0).validate(), Err(ConfigError::ZeroHits));
    }

    #[test]
    fn test_plan_rate() {
        let plan = DispatchPlan::rate(50, Duration::from_secs(2));
        assert_eq!(plan.total_instants(), 100);
        assert_eq!(plan.interval(), Some(Duration::from_millis(20)));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_rate_fractional_duration() {
        let plan = DispatchPlan::rate(10, Duration::from_millis(1500));
        assert_eq!(plan.total_instants(), 15);
    }

    #[test]
    fn test_plan_zero_rate_rejected() {
        let plan = DispatchPlan::rate(0, Duration::from_secs(1));
        assert_eq!(plan.validate(), Err(ConfigError::ZeroRate));
        assert!(plan.interval().is_none());
    }

    #[test]
    fn test_plan_zero_duration_rejected() {
        let plan = DispatchPlan::rate(10, Duration::ZERO);
        assert_eq!(plan.validate(), Err(ConfigError::ZeroDuration));
    }

    #[test]
    fn test_plan_rounding_to_nothing_rejected() {
        let plan = DispatchPlan::rate(1, Duration::from_millis(100));
        assert!(matches!(
            plan.validate(),
            Err(ConfigError::EmptyPlan { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::new(5).with_max_redirects(3);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("local_address"));

        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.pool_size, 5);
        assert_eq!(deserialized.max_redirects, Some(3));
    }

    #[test]
    fn test_plan_serialization() {
        let plan = DispatchPlan::count(10);
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"count\""));

        let deserialized: DispatchPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, plan);
    }
}
