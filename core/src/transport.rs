//! HTTP transport used by workers
//!
//! Workers never talk to reqwest directly: they hand a materialized request
//! to a [`Transport`] and get back an [`Exchange`] carrying the status and a
//! body stream. The production implementation is [`ReqwestTransport`], one
//! pooled client shared by every worker of an engine; tests plug in mocks.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::{redirect, Client, Request, StatusCode};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::config::{ConfigError, EngineConfig};

/// TCP keep-alive probe interval when connection reuse is enabled
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Body of an [`Exchange`]
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

// ============================================================================
// Transport Trait
// ============================================================================

/// Executes one HTTP round trip
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier for logs
    fn name(&self) -> &str;

    /// Send a request and return once the response head has arrived
    ///
    /// The body is left unread on the returned [`Exchange`].
    async fn send(&self, request: Request) -> Result<Exchange, TransportError>;
}

/// A response whose head has arrived and whose body is still pending
pub struct Exchange {
    status: StatusCode,
    body: BodyStream,
}

impl Exchange {
    /// Create an exchange from a status and a body stream
    pub fn new(status: StatusCode, body: BodyStream) -> Self {
        Self { status, body }
    }

    /// Exchange with an in-memory body
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::new(status, stream::once(async move { Ok(body) }).boxed())
    }

    /// Exchange without a body
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, stream::empty().boxed())
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read and drop the whole body, returning its length
    pub async fn discard_body(self) -> Result<u64, TransportError> {
        self.body
            .try_fold(0u64, |received, chunk| async move {
                Ok::<_, TransportError>(received + chunk.len() as u64)
            })
            .await
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Whether a response status counts as a successful hit (`200..400`)
pub fn is_success_status(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Status line recorded for unsuccessful responses, e.g. `503 Service Unavailable`
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Failure of one round trip
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response within the configured timeout
    #[error("timeout: {0}")]
    Timeout(String),

    /// Connection or TLS handshake failed
    #[error("connect: {0}")]
    Connect(String),

    /// Response body could not be read
    #[error("body: {0}")]
    Body(String),

    /// Redirect limit exceeded
    #[error("redirect: {0}")]
    Redirect(String),

    /// Any other request failure
    #[error("request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(message)
        } else if err.is_redirect() {
            TransportError::Redirect(message)
        } else {
            TransportError::Request(message)
        }
    }
}

/// Render an error with all of its sources
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Pooled reqwest client shared by every worker of an engine
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the client described by an engine configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if reqwest rejects the configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let idle_per_host = if config.keep_alive {
            config.max_idle_connections
        } else {
            0
        };

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(idle_per_host)
            .local_address(config.local_address)
            .danger_accept_invalid_certs(config.tls.accept_invalid_certs)
            .user_agent(format!("boom/{}", env!("CARGO_PKG_VERSION")));

        if config.keep_alive {
            builder = builder.tcp_keepalive(TCP_KEEPALIVE);
        }

        if !config.http2 {
            builder = builder.http1_only();
        }

        if let Some(max) = config.max_redirects {
            builder = builder.redirect(if max == 0 {
                redirect::Policy::none()
            } else {
                redirect::Policy::limited(max)
            });
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::Client(error_chain(&e)))?;

        tracing::debug!(
            keep_alive = config.keep_alive,
            idle_per_host,
            http2 = config.http2,
            timeout_ms = config.timeout.as_millis() as u64,
            "HTTP client ready"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    async fn send(&self, request: Request) -> Result<Exchange, TransportError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes_stream().map_err(TransportError::from).boxed();
        Ok(Exchange::new(status, body))
    }
}
