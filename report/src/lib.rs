//! Report output for boom runs
//!
//! This crate renders a [`boom_core::Report`] as:
//!
//! - The plain-text console summary ([`HumanReport`])
//! - Pretty-printed JSON ([`JsonReport`])
//!
//! [`write_report`] sends either rendering to stdout or to a file;
//! [`write_no_data`] does the same for a run that collected nothing.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod human;
mod json;

pub use human::HumanReport;
pub use json::JsonReport;

use boom_core::Report;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Errors raised while writing a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Writing to the destination failed
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding failed
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown `-R/--report-format` value
    #[error("unsupported report format '{0}' (expected text or json)")]
    UnknownFormat(String),
}

/// Rendering of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Console summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "human" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ReportError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Where a report goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    /// Standard output
    #[default]
    Stdout,
    /// A file, created or truncated
    File(PathBuf),
}

impl FromStr for Destination {
    type Err = std::convert::Infallible;

    /// `Stdout` (any case) or `-` selects standard output; anything else is a path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" || s.eq_ignore_ascii_case("stdout") {
            Ok(Self::Stdout)
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

/// Message of a run that produced no samples
pub const NO_DATA: &str = "No data collected";

/// Render `report` in `format` to `destination`
pub fn write_report(
    report: &Report,
    format: ReportFormat,
    destination: &Destination,
) -> Result<(), ReportError> {
    with_destination(destination, |out| render(report, format, out))
}

/// Write the report of a run that produced no samples
pub fn write_no_data(format: ReportFormat, destination: &Destination) -> Result<(), ReportError> {
    with_destination(destination, |out| render_no_data(format, out))
}

fn with_destination<F>(destination: &Destination, write: F) -> Result<(), ReportError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), ReportError>,
{
    match destination {
        Destination::Stdout => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write(&mut out)
        }
        Destination::File(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write(&mut out)
        }
    }
}

/// Render `report` in `format` to any writer
pub fn render<W: Write>(report: &Report, format: ReportFormat, mut out: W) -> Result<(), ReportError> {
    match format {
        ReportFormat::Text => HumanReport::write(report, &mut out)?,
        ReportFormat::Json => JsonReport::write(report, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

/// Render the no-data report in `format` to any writer
pub fn render_no_data<W: Write>(format: ReportFormat, mut out: W) -> Result<(), ReportError> {
    match format {
        ReportFormat::Text => HumanReport::write_no_data(&mut out)?,
        ReportFormat::Json => JsonReport::write_no_data(&mut out)?,
    }
    out.flush()?;
    Ok(())
}
