//! The assembled per-event analysis.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vbsel_core::{Error, EventRecord, HistogramSink, Result, RowWriter};
use vbsel_io::{HistogramBook, NtupleBuffer, NtupleSchema};

use crate::config::AnalysisConfig;
use crate::emit::OutputEmitter;
use crate::pipeline::{SelectionPipeline, SkipReason};
use crate::regions::{RegionClassifier, RegionSet};
use crate::variables::{EventView, VariableCatalogue, derive};

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Vetoed before any output.
    Skipped(SkipReason),
    /// Histograms filled and a row written; carries the region memberships.
    Accepted(RegionSet),
}

/// Pipeline, variables, regions and output layout built from a config.
#[derive(Debug)]
pub struct Analysis {
    pipeline: SelectionPipeline,
    catalogue: VariableCatalogue,
    classifier: RegionClassifier,
    emitter: OutputEmitter,
    book: HistogramBook,
    schema: Arc<NtupleSchema>,
}

impl Analysis {
    /// Resolve `config` into a runnable analysis.
    ///
    /// Fails on unknown histogram names, region expressions that do not
    /// parse or reference unknown variables, and name clashes in the output.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let mut catalogue =
            VariableCatalogue::standard(config.mtb_max_jets, config.bjet_partition.tag);
        for (name, binning) in &config.histograms {
            catalogue.set_binning(name, *binning)?;
        }
        let mut classifier = RegionClassifier::new();
        for (name, cut) in &config.regions {
            classifier.register_expr(name.as_str(), cut, &catalogue)?;
        }
        Self::assemble(config.pipeline(), catalogue, classifier)
    }

    /// Build from explicit parts, e.g. closure regions or custom variables.
    pub fn assemble(
        pipeline: SelectionPipeline,
        catalogue: VariableCatalogue,
        classifier: RegionClassifier,
    ) -> Result<Self> {
        let emitter = OutputEmitter::declare(&catalogue, &classifier)?;
        let book = emitter.book()?;
        let schema = Arc::new(emitter.schema()?);
        emitter.validate(&book, &NtupleBuffer::new(Arc::clone(&schema)))?;
        tracing::debug!(
            variables = catalogue.len(),
            histograms = book.len(),
            regions = classifier.names().len(),
            overlap_steps = pipeline.overlap.len(),
            "analysis assembled"
        );
        Ok(Self { pipeline, catalogue, classifier, emitter, book, schema })
    }

    /// Empty histogram book with every booking.
    pub fn new_book(&self) -> HistogramBook {
        self.book.empty_clone()
    }

    /// Empty ntuple buffer for the output schema.
    pub fn new_ntuple(&self) -> NtupleBuffer {
        NtupleBuffer::new(Arc::clone(&self.schema))
    }

    /// Declared region names, `inclusive` first.
    pub fn region_names(&self) -> &[String] {
        self.classifier.names()
    }

    /// Variable catalogue.
    pub fn catalogue(&self) -> &VariableCatalogue {
        &self.catalogue
    }

    /// Selection stages.
    pub fn pipeline(&self) -> &SelectionPipeline {
        &self.pipeline
    }

    /// Select, derive, classify and emit one event.
    ///
    /// Skipped events touch neither `sink` nor `writer`.
    pub fn process_event(
        &self,
        event: &EventRecord,
        sink: &mut impl HistogramSink,
        writer: &mut impl RowWriter,
    ) -> Result<EventOutcome> {
        let selection = match self.pipeline.select(event) {
            Ok(s) => s,
            Err(reason) => return Ok(EventOutcome::Skipped(reason)),
        };
        let vars = derive(&self.catalogue, &EventView::new(event, &selection));
        let regions = self.classifier.classify(&vars);
        self.emitter.emit(&vars, &regions, event.weight(), sink, writer)?;
        Ok(EventOutcome::Accepted(regions))
    }
}

/// Yield of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionYield {
    /// Region name.
    pub name: String,
    /// Accepted events.
    pub events: u64,
    /// Sum of weights of accepted events.
    pub sum_weights: f64,
}

/// Event counts through the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutflow {
    /// Events read.
    pub processed: u64,
    /// Skipped events per reason.
    pub skipped: BTreeMap<SkipReason, u64>,
    /// Events that passed the selection.
    pub accepted: u64,
    /// Sum of weights of accepted events.
    pub sum_weights: f64,
    /// Per-region yields in declaration order.
    pub regions: Vec<RegionYield>,
}

impl Cutflow {
    /// Zeroed cutflow for the given regions.
    pub fn new(region_names: &[String]) -> Self {
        Self {
            processed: 0,
            skipped: [SkipReason::BadJet, SkipReason::TooFewJets].into_iter().map(|r| (r, 0)).collect(),
            accepted: 0,
            sum_weights: 0.0,
            regions: region_names
                .iter()
                .map(|n| RegionYield { name: n.clone(), events: 0, sum_weights: 0.0 })
                .collect(),
        }
    }

    /// Count one event.
    pub fn record(&mut self, outcome: &EventOutcome, weight: f64) {
        self.processed += 1;
        match outcome {
            EventOutcome::Skipped(reason) => *self.skipped.entry(*reason).or_insert(0) += 1,
            EventOutcome::Accepted(regions) => {
                self.accepted += 1;
                self.sum_weights += weight;
                for (slot, (_, hit)) in self.regions.iter_mut().zip(regions.iter()) {
                    if hit {
                        slot.events += 1;
                        slot.sum_weights += weight;
                    }
                }
            }
        }
    }

    /// Total skipped events.
    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    /// Add `other`, which must cover the same regions.
    pub fn merge(&mut self, other: &Cutflow) -> Result<()> {
        if self.regions.len() != other.regions.len()
            || self.regions.iter().zip(&other.regions).any(|(a, b)| a.name != b.name)
        {
            return Err(Error::Validation("cannot merge cutflows with different regions".into()));
        }
        self.processed += other.processed;
        self.accepted += other.accepted;
        self.sum_weights += other.sum_weights;
        for (reason, n) in &other.skipped {
            *self.skipped.entry(*reason).or_insert(0) += n;
        }
        for (a, b) in self.regions.iter_mut().zip(&other.regions) {
            a.events += b.events;
            a.sum_weights += b.sum_weights;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vbsel_core::{MissingEnergy, ObjectCollection, ObjectFlags, PhysicalObject};

    fn event(n_jets: usize, weight: f64) -> EventRecord {
        let good = ObjectFlags::LOOSE_BAD_JET | ObjectFlags::JVT50_JET;
        EventRecord {
            jets: ObjectCollection::from_unsorted(
                (0..n_jets)
                    .map(|i| {
                        let tag = if i < 2 { ObjectFlags::BTAG77_MV2C10 } else { ObjectFlags::EMPTY };
                        PhysicalObject::new(100.0 - 20.0 * i as f64, 0.0, i as f64 * 1.2 - 3.0, 0.0, good | tag)
                    })
                    .collect(),
            ),
            met: MissingEnergy::new(50.0, 0.5),
            weights: vec![weight],
            ..Default::default()
        }
    }

    fn analysis() -> Analysis {
        let mut config = AnalysisConfig::default();
        config.regions.insert("SR_2b".into(), "bjets_n >= 2".into());
        config.regions.insert("SR_3b".into(), "bjets_n >= 3".into());
        Analysis::from_config(&config).unwrap()
    }

    #[test]
    fn accepted_and_skipped_events() {
        let a = analysis();
        let mut book = a.new_book();
        let mut rows = a.new_ntuple();
        let mut flow = Cutflow::new(a.region_names());

        for (ev, w) in [(event(4, 2.0), 2.0), (event(3, 1.0), 1.0), (event(5, 0.5), 0.5)] {
            let outcome = a.process_event(&ev, &mut book, &mut rows).unwrap();
            flow.record(&outcome, w);
        }

        assert_eq!(rows.n_rows(), 2);
        assert_eq!(flow.processed, 3);
        assert_eq!(flow.accepted, 2);
        assert_eq!(flow.skipped[&SkipReason::TooFewJets], 1);
        assert_eq!(flow.skipped[&SkipReason::BadJet], 0);
        assert_relative_eq!(flow.sum_weights, 2.5, epsilon = 1e-12);
        assert_eq!(a.region_names(), &["inclusive", "SR_2b", "SR_3b"]);
        assert_eq!(flow.regions[1].events, 2);
        assert_eq!(flow.regions[2].events, 0);
        assert_eq!(book.get("jets_n").unwrap().entries, 2);
        assert_eq!(rows.column_bool("region_SR_2b").unwrap(), &[true, true]);
    }

    #[test]
    fn skipped_event_leaves_outputs_untouched() {
        let a = analysis();
        let mut book = a.new_book();
        let mut rows = a.new_ntuple();
        let mut ev = event(4, 1.0);
        let mut jets = ev.jets.clone().into_vec();
        jets.push(PhysicalObject::new(22.0, 1.0, 1.0, 0.0, ObjectFlags::JVT50_JET));
        ev.jets = ObjectCollection::from_unsorted(jets);
        let outcome = a.process_event(&ev, &mut book, &mut rows).unwrap();
        assert_eq!(outcome, EventOutcome::Skipped(SkipReason::BadJet));
        assert_eq!(rows.n_rows(), 0);
        assert!(book.histograms().iter().all(|h| h.entries == 0));
    }

    #[test]
    fn bad_region_expression_fails_setup() {
        let mut config = AnalysisConfig::default();
        config.regions.insert("SR".into(), "n_bjets >= 2".into());
        assert!(Analysis::from_config(&config).is_err());
        let mut config = AnalysisConfig::default();
        config.histograms.insert("not_a_variable".into(), vbsel_io::Binning::new(1, 0.0, 1.0).unwrap());
        assert!(Analysis::from_config(&config).is_err());
    }

    #[test]
    fn cutflow_merge() {
        let names = vec!["inclusive".to_string()];
        let mut a = Cutflow::new(&names);
        let mut b = Cutflow::new(&names);
        a.record(&EventOutcome::Skipped(SkipReason::BadJet), 1.0);
        b.record(&EventOutcome::Skipped(SkipReason::BadJet), 1.0);
        b.record(&EventOutcome::Skipped(SkipReason::TooFewJets), 1.0);
        a.merge(&b).unwrap();
        assert_eq!(a.processed, 3);
        assert_eq!(a.total_skipped(), 3);
        assert_eq!(a.skipped[&SkipReason::BadJet], 2);
        let other = Cutflow::new(&["inclusive".to_string(), "SR".to_string()]);
        assert!(a.merge(&other).is_err());
    }

    #[test]
    fn cutflow_serializes_reason_labels() {
        let flow = Cutflow::new(&["inclusive".to_string()]);
        let json = serde_json::to_string(&flow).unwrap();
        assert!(json.contains("\"bad_jet\":0"));
        assert!(json.contains("\"too_few_jets\":0"));
    }
}
