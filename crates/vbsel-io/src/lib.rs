//! # vbsel-io
//!
//! Storage-side collaborators for the vbsel selection pipeline:
//! - [`JsonlEventSource`], an [`vbsel_core::EventSource`] over JSON lines,
//! - [`HistogramBook`], an in-memory [`vbsel_core::HistogramSink`],
//! - [`NtupleBuffer`], a columnar [`vbsel_core::RowWriter`] exported to
//!   Arrow and Parquet,
//! - [`CompiledExpr`], the cut-expression engine used for region predicates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod book;
pub mod expr;
pub mod histogram;
pub mod ntuple;
pub mod parquet;
pub mod source;

pub use book::HistogramBook;
pub use expr::{BoundExpr, CompiledExpr};
pub use histogram::{BinIndex, Binning, Histogram};
pub use ntuple::{ColumnType, NtupleBuffer, NtupleSchema};
pub use self::parquet::{
    ParquetError, ParquetFileWriter, read_parquet, read_parquet_bytes, write_parquet, write_parquet_bytes,
};
pub use source::JsonlEventSource;
