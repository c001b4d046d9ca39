//! Per-event object selection.
//!
//! Stages, in order: baseline cuts, bad-jet veto, jet quality filter,
//! overlap plan, signal cuts, b-jet partition, minimum jet count. The two
//! vetoes stop the event early and are reported as a [`SkipReason`], not as
//! an error.

use serde::{Deserialize, Serialize};

use vbsel_core::{EventRecord, FlagMask, ObjectCollection, ObjectFlags};

use crate::filter::{ObjectCut, filter_objects, has_bad_object};
use crate::overlap::{ObjectSet, OverlapStep, default_plan, resolve_overlaps};

/// One cut per object kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutSet {
    /// Electron cut.
    pub electrons: ObjectCut,
    /// Muon cut.
    pub muons: ObjectCut,
    /// Tau cut.
    pub taus: ObjectCut,
    /// Jet cut.
    pub jets: ObjectCut,
}

impl CutSet {
    /// Loose object definitions applied to the raw collections.
    pub const fn baseline() -> Self {
        Self {
            electrons: ObjectCut::with_flags(8.0, 5.0, ObjectFlags::E_LOOSE_LH),
            muons: ObjectCut::with_flags(8.0, 5.0, ObjectFlags::MU_MEDIUM),
            taus: ObjectCut::with_flags(8.0, 5.0, ObjectFlags::TAU_RNN_LOOSE),
            jets: ObjectCut::kinematic(20.0, 5.0),
        }
    }

    /// Tight object definitions applied after overlap removal.
    pub const fn signal() -> Self {
        Self {
            electrons: ObjectCut::with_flags(
                8.0,
                2.47,
                ObjectFlags::E_TIGHT_LH
                    .union(ObjectFlags::E_D0_SIGMA5)
                    .union(ObjectFlags::E_Z0_05MM)
                    .union(ObjectFlags::E_ISO_BOOSTED),
            ),
            muons: ObjectCut::with_flags(
                8.0,
                2.5,
                ObjectFlags::MU_D0_SIGMA3
                    .union(ObjectFlags::MU_Z0_05MM)
                    .union(ObjectFlags::MU_ISO_BOOSTED)
                    .union(ObjectFlags::MU_NOT_COSMIC),
            ),
            taus: ObjectCut::with_flags(20.0, 2.5, ObjectFlags::TAU_RNN_LOOSE),
            jets: ObjectCut::kinematic(5.0, 0.0),
        }
    }

    fn apply(&self, event: &EventRecord) -> ObjectSet {
        ObjectSet {
            electrons: filter_objects(&event.electrons, &self.electrons),
            muons: filter_objects(&event.muons, &self.muons),
            taus: filter_objects(&event.taus, &self.taus),
            jets: filter_objects(&event.jets, &self.jets),
        }
    }

    fn apply_to(&self, objects: &ObjectSet) -> ObjectSet {
        ObjectSet {
            electrons: filter_objects(&objects.electrons, &self.electrons),
            muons: filter_objects(&objects.muons, &self.muons),
            taus: filter_objects(&objects.taus, &self.taus),
            jets: filter_objects(&objects.jets, &self.jets),
        }
    }
}

/// Event veto on jets lacking a quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BadJetVeto {
    /// Minimum pt of jets inspected.
    pub pt_min: f64,
    /// Maximum |eta| of jets inspected.
    pub eta_max: f64,
    /// Flag every inspected jet must carry.
    pub quality: ObjectFlags,
}

impl Default for BadJetVeto {
    fn default() -> Self {
        Self { pt_min: 20.0, eta_max: 5.0, quality: ObjectFlags::LOOSE_BAD_JET }
    }
}

/// Split of signal jets into tagged and untagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BJetPartition {
    /// Minimum pt of partitioned jets.
    pub pt_min: f64,
    /// Maximum |eta| of partitioned jets.
    pub eta_max: f64,
    /// Tagging flag.
    pub tag: ObjectFlags,
}

impl Default for BJetPartition {
    fn default() -> Self {
        Self { pt_min: 30.0, eta_max: 5.0, tag: ObjectFlags::BTAG77_MV2C10 }
    }
}

impl BJetPartition {
    fn split(&self, jets: &ObjectCollection) -> (ObjectCollection, ObjectCollection) {
        let tagged = ObjectCut::kinematic(self.pt_min, self.eta_max).mask(FlagMask::all(self.tag));
        let untagged = ObjectCut::kinematic(self.pt_min, self.eta_max).mask(FlagMask::not(self.tag));
        (filter_objects(jets, &tagged), filter_objects(jets, &untagged))
    }
}

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A baseline jet failed the quality flag.
    BadJet,
    /// Fewer signal jets than required.
    TooFewJets,
}

impl SkipReason {
    /// Stable label used in logs and the cutflow.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::BadJet => "bad_jet",
            SkipReason::TooFewJets => "too_few_jets",
        }
    }
}

/// Collections produced for one accepted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Objects after baseline cuts, jet quality and overlap removal.
    pub baseline: ObjectSet,
    /// Objects after signal cuts.
    pub signal: ObjectSet,
    /// Signal electrons, muons and taus concatenated in that order.
    pub leptons: ObjectCollection,
    /// Tagged signal jets.
    pub bjets: ObjectCollection,
    /// Untagged signal jets.
    pub nonbjets: ObjectCollection,
}

/// Stage configuration plus the ordered overlap plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPipeline {
    /// Baseline cuts.
    pub baseline: CutSet,
    /// Bad-jet event veto.
    pub bad_jet_veto: BadJetVeto,
    /// Jet vertex-association filter.
    pub jet_quality: ObjectCut,
    /// Overlap plan.
    pub overlap: Vec<OverlapStep>,
    /// Signal cuts.
    pub signal: CutSet,
    /// B-jet partition.
    pub bjet_partition: BJetPartition,
    /// Minimum number of signal jets.
    pub min_signal_jets: usize,
}

impl Default for SelectionPipeline {
    fn default() -> Self {
        Self {
            baseline: CutSet::baseline(),
            bad_jet_veto: BadJetVeto::default(),
            jet_quality: ObjectCut::with_flags(20.0, 5.0, ObjectFlags::JVT50_JET),
            overlap: default_plan(),
            signal: CutSet::signal(),
            bjet_partition: BJetPartition::default(),
            min_signal_jets: 4,
        }
    }
}

impl SelectionPipeline {
    /// Run every stage over `event`.
    pub fn select(&self, event: &EventRecord) -> Result<Selection, SkipReason> {
        let mut baseline = self.baseline.apply(event);

        let veto = &self.bad_jet_veto;
        if has_bad_object(&baseline.jets, veto.pt_min, veto.eta_max, veto.quality) {
            return Err(SkipReason::BadJet);
        }

        baseline.jets = filter_objects(&baseline.jets, &self.jet_quality);
        resolve_overlaps(&self.overlap, &mut baseline);

        let signal = self.signal.apply_to(&baseline);
        if signal.jets.len() < self.min_signal_jets {
            return Err(SkipReason::TooFewJets);
        }

        let leptons = ObjectCollection::concat([&signal.electrons, &signal.muons, &signal.taus]);
        let (bjets, nonbjets) = self.bjet_partition.split(&signal.jets);
        Ok(Selection { baseline, signal, leptons, bjets, nonbjets })
    }
}
