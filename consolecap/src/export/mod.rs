//! Report export
//!
//! This module hands a merged record to the outside world: as plain JSON for
//! offline analysis, or assembled into a [`BugReport`] for a [`ReportSink`].

pub mod report;

pub use report::{
    file_report, BugReport, JsonFileSink, NoScreenshot, ReportSink, ScreenshotSource,
    StaticScreenshot, TicketRef,
};

use std::io::{Read, Write};

use crate::domain::ExportError;
use crate::event_data::DiagnosticEvent;
use crate::merge::MergedRecord;

/// Serialize a merged record as a pretty-printed JSON array
///
/// # Errors
/// Returns an error if serialization or the underlying write fails
pub fn write_record<W: Write>(record: &MergedRecord, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, record)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Load a saved event list (a store snapshot or a previously exported record)
///
/// # Errors
/// Returns an error if the input is not a JSON array of events
pub fn read_events<R: Read>(reader: R) -> Result<Vec<DiagnosticEvent>, ExportError> {
    Ok(serde_json::from_reader(reader)?)
}
