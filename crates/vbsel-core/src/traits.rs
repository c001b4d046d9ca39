//! Collaborator traits for vbsel
//!
//! The selection pipeline never touches files. It pulls events from an
//! [`EventSource`], fills an [`HistogramSink`] and writes rows through a
//! [`RowWriter`]; concrete implementations live in `vbsel-io` and can be
//! swapped without touching the analysis.

use crate::Result;
use crate::types::EventRecord;

/// Pull-based supplier of events.
pub trait EventSource {
    /// Next event, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Result<Option<EventRecord>>;
}

/// Accumulator of named 1-D histograms.
///
/// Names are declared up front; filling an unknown name is a configuration
/// error.
pub trait HistogramSink {
    /// Whether `name` was declared.
    fn is_declared(&self, name: &str) -> bool;

    /// Fill `value` with `weight` into the histogram `name`.
    fn fill(&mut self, name: &str, value: f64, weight: f64) -> Result<()>;
}

/// One typed value in an output row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Floating-point column.
    Float(f64),
    /// Integer column.
    Int(i64),
    /// Boolean column.
    Bool(bool),
}

/// Row-oriented writer: fields accumulate into a pending row that is
/// committed atomically by [`RowWriter::end_row`].
pub trait RowWriter {
    /// Whether `name` is a declared field.
    fn has_field(&self, name: &str) -> bool;

    /// Set field `name` of the pending row.
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// Commit the pending row.
    fn end_row(&mut self) -> Result<()>;
}
