//! # vbsel-analysis
//!
//! Event selection for a multi-jet plus missing-momentum search.
//!
//! Per event the [`SelectionPipeline`] applies baseline cuts, a bad-jet
//! veto, a jet quality filter, an ordered overlap plan and signal cuts; the
//! [`VariableCatalogue`] turns the surviving collections into named scalars;
//! the [`RegionClassifier`] assigns regions; the [`OutputEmitter`] fills
//! histograms and writes one ntuple row. [`run_events`] drives a whole
//! [`vbsel_core::EventSource`] through an [`Analysis`] with rayon.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod driver;
pub mod emit;
pub mod filter;
pub mod kinematics;
pub mod overlap;
pub mod pipeline;
pub mod regions;
pub mod variables;

pub use analysis::{Analysis, Cutflow, EventOutcome, RegionYield};
pub use config::{AnalysisConfig, RunSettings};
pub use driver::{RunOutput, run_events, run_events_streaming};
pub use emit::OutputEmitter;
pub use filter::{ObjectCut, count_objects, filter_objects, has_bad_object, sum_pt};
pub use overlap::{
    ConeReference, ObjectSet, OverlapStep, OverlapVeto, RadiusRule, default_plan, remove_overlap,
    resolve_overlaps,
};
pub use pipeline::{BJetPartition, BadJetVeto, CutSet, Selection, SelectionPipeline, SkipReason};
pub use regions::{INCLUSIVE, RegionClassifier, RegionSet};
pub use variables::{DerivedVariableSet, EventView, VariableCatalogue, derive};
