//! CLI argument parsing and run orchestration

use anyhow::{bail, Context, Result};
use boom_core::{
    AggregationError, Cookie, DispatchPlan, EngineBuilder, EngineConfig, RequestTarget, Sample,
    StatisticsAggregator, StopHandle, TlsPolicy,
};
use boom_report::{write_no_data, write_report, Destination, ReportFormat};
use clap::Parser;
use futures::{Stream, StreamExt};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Prefix of a `-D` value naming a file to read the body from
const BODY_FILE_PREFIX: &str = "@@";

/// Exit status after a second interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "boom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target URL
    #[arg(short = 'u', long)]
    pub url: String,

    /// HTTP method (HEAD, GET, PUT, POST, PATCH, OPTIONS, DELETE)
    #[arg(short = 'm', long, default_value = "GET")]
    pub method: String,

    /// Request headers as `name:value;name2:value2`
    #[arg(short = 'H', long)]
    pub headers: Option<String>,

    /// Request body; `@@path` reads it from a file
    #[arg(short = 'D', long)]
    pub data: Option<String>,

    /// Content-Type of the request body
    #[arg(short = 'c', long = "content-type")]
    pub content_type: Option<String>,

    /// Cookie as `name=value`
    #[arg(short = 'C', long)]
    pub cookie: Option<String>,

    /// Workers started before the first dispatch
    #[arg(short = 'g', long = "pool-size", default_value_t = 100)]
    pub pool_size: usize,

    /// Upper bound on the grown worker pool (unbounded when absent)
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,

    /// Reuse connections across requests
    #[arg(short = 'k', long = "keep-alive")]
    pub keep_alive: bool,

    /// Local address outgoing connections bind to
    #[arg(long = "la")]
    pub local_address: Option<IpAddr>,

    /// Verify server certificates
    #[arg(long = "strict-tls")]
    pub strict_tls: bool,

    /// Allow HTTP/2
    #[arg(long)]
    pub http2: bool,

    /// Redirect limit (0 disables redirects)
    #[arg(long = "max-redirects")]
    pub max_redirects: Option<usize>,

    /// Total requests; selects count mode when set
    #[arg(short = 'n', long = "requests")]
    pub requests: Option<u64>,

    /// Requests per second in rate mode
    #[arg(short = 'r', long, default_value_t = 50)]
    pub rate: u32,

    /// Run duration in rate mode
    #[arg(short = 't', long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Per-request timeout
    #[arg(short = 's', long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Report destination: `Stdout` or a file path
    #[arg(short = 'o', long, default_value = "Stdout")]
    pub output: Destination,

    /// Report format (text or json)
    #[arg(short = 'R', long = "report-format", default_value = "text")]
    pub report_format: ReportFormat,

    /// Enable logs
    #[arg(short = 'l', long)]
    pub logs: bool,

    /// Async runtime worker threads
    #[arg(long, default_value_t = 1)]
    pub cpu: usize,
}

impl Cli {
    /// Run one load test and write its report
    pub async fn run(&self) -> Result<()> {
        let target = self.target()?;
        let server = target.server_info();
        let plan = self.plan();

        let engine = EngineBuilder::new()
            .config(self.engine_config())
            .build()
            .context("invalid engine configuration")?;

        let stop = engine.stop_handle();
        let interrupt = tokio::spawn(async move {
            let signals = futures::stream::unfold((), |()| async {
                tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
            });
            if watch_interrupts(Box::pin(signals), stop).await {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        });

        let mut stream = engine.launch(target, plan).context("failed to launch run")?;

        let mut samples: Vec<Sample> = Vec::new();
        stream.drain_into(&mut samples).await;
        let summary = stream.summary().await?;
        interrupt.abort();

        tracing::info!(
            dispatched = summary.dispatched,
            workers = summary.workers,
            samples = samples.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Run finished"
        );

        let aggregator = StatisticsAggregator::new(self.pool_size).with_server(server);
        let report = match aggregator.reduce(&samples) {
            Ok(report) => report,
            Err(AggregationError::NoSamples) => {
                tracing::warn!("Run finished without samples");
                return write_no_data(self.report_format, &self.output)
                    .with_context(|| format!("failed to write report to {:?}", self.output));
            }
            Err(e) => return Err(e).context("failed to aggregate samples"),
        };

        write_report(&report, self.report_format, &self.output)
            .with_context(|| format!("failed to write report to {:?}", self.output))?;

        Ok(())
    }

    fn target(&self) -> Result<RequestTarget> {
        let mut builder = RequestTarget::builder()
            .method(self.method.as_str())
            .url(self.url.as_str());

        if let Some(line) = &self.headers {
            builder = builder.headers_line(line.as_str());
        }
        if let Some(data) = &self.data {
            builder = builder.body(read_body(data)?);
        }
        if let Some(content_type) = &self.content_type {
            builder = builder.content_type(content_type.as_str());
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.cookie(Cookie::parse(cookie).context("invalid cookie")?);
        }

        builder.build().context("invalid request target")
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.pool_size)
            .with_timeout(self.timeout)
            .with_keep_alive(self.keep_alive)
            .with_http2(self.http2);

        if self.strict_tls {
            config = config.with_tls(TlsPolicy::strict());
        }
        if let Some(addr) = self.local_address {
            config = config.with_local_address(addr);
        }
        if let Some(max) = self.max_redirects {
            config = config.with_max_redirects(max);
        }
        if let Some(max) = self.max_workers {
            config = config.with_max_workers(max);
        }
        config
    }

    fn plan(&self) -> DispatchPlan {
        match self.requests {
            Some(total) => DispatchPlan::count(total),
            None => DispatchPlan::rate(self.rate, self.duration),
        }
    }
}

/// Stop the run on the first interrupt
///
/// Returns `true` when a second interrupt arrives before the run has drained.
async fn watch_interrupts<S>(mut signals: S, stop: StopHandle) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if signals.next().await.is_none() {
        return false;
    }
    tracing::warn!("Interrupted, draining in-flight requests (interrupt again to exit)");
    stop.stop();

    if signals.next().await.is_none() {
        return false;
    }
    tracing::error!("Interrupted again, exiting without a report");
    true
}

/// Literal body, or the contents of the file after `@@`
fn read_body(data: &str) -> Result<Vec<u8>> {
    match data.strip_prefix(BODY_FILE_PREFIX) {
        Some(path) => {
            if path.is_empty() {
                bail!("body file path is empty");
            }
            std::fs::read(Path::new(path))
                .with_context(|| format!("failed to read body from {path}"))
        }
        None => Ok(data.as_bytes().to_vec()),
    }
}
