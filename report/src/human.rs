//! Plain-text console summary

use crate::NO_DATA;
use boom_core::Report;
use std::io::{self, Write};

/// Renders a [`Report`] as the console summary
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanReport;

impl HumanReport {
    /// Write the summary
    pub fn write<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
        if let Some(server) = &report.server {
            writeln!(out, "Server Hostname: {}", server.host)?;
            writeln!(out, "Server Port: {}", server.port)?;
            writeln!(out, "Target URL: {}", server.url)?;
            writeln!(out)?;
        }

        writeln!(out, "Concurrency Level: {}", report.concurrency_level)?;
        writeln!(out, "Time taken for tests: {:.6}s", report.time_taken)?;
        writeln!(out)?;

        writeln!(out, "Complete requests: {}", report.completed_requests)?;
        writeln!(out, "Failed requests: {}", report.failed_requests)?;
        writeln!(out, "Success Rate: {:.2} %", report.success_rate * 100.0)?;
        writeln!(out)?;

        writeln!(out, "Total sent: {} bytes", report.total_sent_bytes)?;
        writeln!(out, "Total received: {} bytes", report.total_received_bytes)?;
        writeln!(out, "Total transferred: {} bytes", report.total_transferred)?;
        writeln!(out, "Transfer rate: {:.3} bytes/s (mean)", report.transfer_rate)?;
        writeln!(out)?;

        writeln!(
            out,
            "Requests per second: {:.3} (mean)",
            report.requests_per_second
        )?;
        writeln!(
            out,
            "Time per request: {:.3}ms (mean)",
            report.time_per_request * 1000.0
        )?;
        writeln!(
            out,
            "Time per request concurrency: {:.3}ms (mean)",
            report.time_per_request_concurrency * 1000.0
        )?;
        writeln!(
            out,
            "Latency(min,mean,max): {:.3}ms, {:.3}ms, {:.3}ms",
            report.min_latency * 1000.0,
            report.mean_latency * 1000.0,
            report.max_latency * 1000.0
        )?;

        let p = &report.latency_percentiles;
        writeln!(
            out,
            "Latency(p50,p90,p95,p99): {:.3}ms, {:.3}ms, {:.3}ms, {:.3}ms",
            p.p50 * 1000.0,
            p.p90 * 1000.0,
            p.p95 * 1000.0,
            p.p99 * 1000.0
        )?;

        if !report.status_codes.is_empty() {
            writeln!(out)?;
            writeln!(out, "Status codes:")?;
            for (code, count) in &report.status_codes {
                let label = if *code == 0 {
                    "no response".to_string()
                } else {
                    code.to_string()
                };
                writeln!(out, "  {label}: {count}")?;
            }
        }

        if !report.errors.is_empty() {
            writeln!(out)?;
            writeln!(out, "Errors:")?;
            for (reason, count) in &report.errors {
                writeln!(out, "  {count}x {reason}")?;
            }
        }

        Ok(())
    }

    /// Write the line reported for a run without samples
    pub fn write_no_data<W: Write>(out: &mut W) -> io::Result<()> {
        writeln!(out, "{NO_DATA}")
    }

    /// Render the summary into a string
    pub fn render(report: &Report) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = Self::write(report, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
