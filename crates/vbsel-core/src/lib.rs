//! # vbsel-core
//!
//! Event data model for the vbsel selection pipeline.
//!
//! This crate owns the leaf types every other crate builds on:
//! - [`FourVector`] and [`MissingEnergy`] kinematics,
//! - [`ObjectFlags`] working-point bitsets and [`FlagMask`] requirements,
//! - [`PhysicalObject`], [`ObjectCollection`] and [`EventRecord`],
//! - the collaborator traits ([`EventSource`], [`HistogramSink`], [`RowWriter`])
//!   through which the analysis talks to storage without depending on it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flags;
pub mod traits;
pub mod types;
pub mod vector;

pub use error::{Error, Result};
pub use flags::{FlagMask, ObjectFlags};
pub use traits::{EventSource, FieldValue, HistogramSink, RowWriter};
pub use types::{
    EventRecord, MissingEnergy, ObjectCollection, ObjectKind, PhysicalObject, SENTINEL,
};
pub use vector::{FourVector, wrap_phi};

/// Crate version, reported by `vbsel version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
