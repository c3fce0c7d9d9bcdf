//! JSON export of run reports

use crate::{ReportError, NO_DATA};
use boom_core::Report;
use std::io::Write;

/// Writes a [`Report`] as pretty-printed JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReport;

impl JsonReport {
    /// Write the report followed by a trailing newline
    pub fn write<W: Write>(report: &Report, mut out: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut out, report)?;
        writeln!(out)?;
        Ok(())
    }

    /// Write `{"error": "No data collected"}` for a run without samples
    pub fn write_no_data<W: Write>(mut out: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut out, &serde_json::json!({ "error": NO_DATA }))?;
        writeln!(out)?;
        Ok(())
    }
}
