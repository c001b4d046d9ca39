//! Derived per-event variables.
//!
//! A [`VariableCatalogue`] is an ordered registry of named pure functions
//! over an [`EventView`]. Its order is the ntuple column order and the
//! histogram booking order. Every function returns a value for every event,
//! using [`SENTINEL`] when the objects it needs are absent, so rows stay
//! uniform-width.

use std::collections::HashMap;
use std::sync::Arc;

use vbsel_core::{
    Error, EventRecord, FourVector, ObjectCollection, ObjectFlags, Result, SENTINEL,
};
use vbsel_io::{Binning, ColumnType};

use crate::filter::sum_pt;
use crate::kinematics::{
    calc_mct, calc_mt_min, delta_r_at, jet_flavor, leading_pair_mass, min_dphi,
    reconstruct_dilepton, recoil_magnitude,
};
use crate::pipeline::Selection;

/// Everything a variable may look at for one accepted event.
#[derive(Debug, Clone, Copy)]
pub struct EventView<'a> {
    /// Raw event.
    pub event: &'a EventRecord,
    /// Selected collections.
    pub selection: &'a Selection,
    /// Same-flavour dilepton system (null when there is none).
    pub dilepton: FourVector,
}

impl<'a> EventView<'a> {
    /// Bundle an event with its selection.
    pub fn new(event: &'a EventRecord, selection: &'a Selection) -> Self {
        let dilepton = reconstruct_dilepton(&selection.signal.electrons, &selection.signal.muons);
        Self { event, selection, dilepton }
    }

    fn jets(&self) -> &'a ObjectCollection {
        &self.selection.signal.jets
    }

    fn bjets(&self) -> &'a ObjectCollection {
        &self.selection.bjets
    }

    fn leptons(&self) -> &'a ObjectCollection {
        &self.selection.leptons
    }

    fn met(&self) -> f64 {
        self.event.met.et
    }
}

type Compute = Box<dyn Fn(&EventView<'_>) -> f64 + Send + Sync>;

/// One registered variable.
pub struct VariableDef {
    name: String,
    column: ColumnType,
    binning: Option<Binning>,
    compute: Compute,
}

impl VariableDef {
    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ntuple column type. Int and bool variables are stored as `f64` in a
    /// [`DerivedVariableSet`] and converted on output.
    pub fn column(&self) -> ColumnType {
        self.column
    }

    /// Histogram binning, if the variable is histogrammed.
    pub fn binning(&self) -> Option<Binning> {
        self.binning
    }
}

impl std::fmt::Debug for VariableDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableDef")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("binning", &self.binning)
            .finish_non_exhaustive()
    }
}

/// Ordered name → function registry.
#[derive(Debug, Default)]
pub struct VariableCatalogue {
    defs: Vec<VariableDef>,
    index: Arc<HashMap<String, usize>>,
}

const COUNTS: Option<Binning> = Some(Binning { n_bins: 20, lo: -0.5, hi: 19.5 });
const PHI: Option<Binning> = Some(Binning { n_bins: 80, lo: -4.0, hi: 4.0 });
const DPHI: Option<Binning> = Some(Binning { n_bins: 40, lo: 0.0, hi: 4.0 });
const DELTA_R: Option<Binning> = Some(Binning { n_bins: 60, lo: 0.0, hi: 6.0 });

const fn bins(n_bins: usize, lo: f64, hi: f64) -> Option<Binning> {
    Some(Binning { n_bins, lo, hi })
}

impl VariableCatalogue {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full analysis variable set.
    ///
    /// `mtb_max_jets` limits how many b-jets `mTb_min` scans (all when
    /// `None`); `btag` is the flag reported by `jet_1_btag`.
    pub fn standard(mtb_max_jets: Option<usize>, btag: ObjectFlags) -> Self {
        use ColumnType::{Bool, Float, Int};

        let mut c = Self::new();

        c.push("jets_n", Int, COUNTS, |v| v.jets().len() as f64);
        c.push("bjets_n", Int, COUNTS, |v| v.bjets().len() as f64);
        c.push("nonbjets_n", Int, COUNTS, |v| v.selection.nonbjets.len() as f64);
        c.push("signal_electrons_n", Int, COUNTS, |v| v.selection.signal.electrons.len() as f64);
        c.push("signal_muons_n", Int, COUNTS, |v| v.selection.signal.muons.len() as f64);
        c.push("signal_taus_n", Int, COUNTS, |v| v.selection.signal.taus.len() as f64);
        c.push("signal_leptons_n", Int, COUNTS, |v| v.leptons().len() as f64);
        c.push("baseline_electrons_n", Int, COUNTS, |v| v.selection.baseline.electrons.len() as f64);
        c.push("baseline_muons_n", Int, COUNTS, |v| v.selection.baseline.muons.len() as f64);
        c.push("baseline_taus_n", Int, COUNTS, |v| v.selection.baseline.taus.len() as f64);
        c.push("baseline_leptons_n", Int, COUNTS, |v| {
            let b = &v.selection.baseline;
            (b.electrons.len() + b.muons.len() + b.taus.len()) as f64
        });

        c.push("met", Float, bins(100, 0.0, 1000.0), |v| v.met());
        c.push("met_phi", Float, PHI, |v| v.event.met.phi);
        c.push("gen_filt_met", Float, bins(200, 0.0, 2000.0), |v| v.event.gen_met);
        c.push("gen_filt_ht", Float, bins(200, 0.0, 2000.0), |v| v.event.gen_ht);
        c.push("mc_weight", Float, bins(1, 0.0, 1.0), |v| v.event.weight());
        c.push("channel_number", Int, None, |v| v.event.process_id as f64);

        c.push("meff_incl", Float, bins(200, 0.0, 2000.0), |v| {
            v.met() + sum_pt(v.jets(), None) + sum_pt(v.leptons(), None)
        });
        c.push("meff_4j", Float, bins(200, 0.0, 2000.0), |v| v.met() + sum_pt(v.jets(), Some(4)));
        c.push("mTb_min", Float, bins(100, 0.0, 1000.0), move |v| {
            calc_mt_min(v.bjets(), &v.event.met, mtb_max_jets)
        });
        c.push("mCT_bb", Float, bins(100, 0.0, 1000.0), |v| match v.bjets().as_slice() {
            [a, b, ..] => calc_mct(a.p4(), b.p4()),
            _ => SENTINEL,
        });
        c.push("dphi_min", Float, DPHI, |v| min_dphi(&v.event.met, v.jets(), 4));
        c.push("dphi_1jet", Float, DPHI, |v| min_dphi(&v.event.met, v.jets(), 1));
        c.push("m_bb", Float, bins(200, 0.0, 1000.0), |v| leading_pair_mass(v.bjets()));
        c.push("m_non_bb", Float, bins(200, 0.0, 1000.0), |v| {
            leading_pair_mass(&v.selection.nonbjets)
        });
        c.push("Z_pt", Float, None, |v| v.dilepton.pt());
        c.push("Z_phi", Float, None, |v| v.dilepton.phi());
        c.push("Z_mass", Float, bins(200, 0.0, 1000.0), |v| v.dilepton.m());
        c.push("ZCR_met", Float, bins(100, 0.0, 1000.0), |v| {
            recoil_magnitude(&v.event.met, &v.dilepton)
        });
        c.push("ZCR_meff_4j", Float, bins(200, 0.0, 2000.0), |v| {
            recoil_magnitude(&v.event.met, &v.dilepton) + sum_pt(v.jets(), Some(4))
        });

        for i in 0..2 {
            let n = i + 1;
            c.push(format!("pt_lep_{n}"), Float, bins(200, 0.0, 1000.0), move |v| v.leptons().pt_at(i));
            c.push(format!("eta_lep_{n}"), Float, bins(80, -4.0, 4.0), move |v| {
                v.leptons().eta_at(i)
            });
            c.push(format!("phi_lep_{n}"), Float, PHI, move |v| v.leptons().phi_at(i));
        }
        for i in 0..6 {
            c.push(format!("pt_jet_{}", i + 1), Float, bins(200, 0.0, 2000.0), move |v| {
                v.jets().pt_at(i)
            });
        }
        for i in 0..6 {
            c.push(format!("eta_jet_{}", i + 1), Float, bins(80, -5.0, 5.0), move |v| {
                v.jets().eta_at(i)
            });
        }
        for i in 0..2 {
            c.push(format!("phi_jet_{}", i + 1), Float, PHI, move |v| v.jets().phi_at(i));
        }
        for i in 0..4 {
            c.push(format!("pt_bjet_{}", i + 1), Float, bins(200, 0.0, 2000.0), move |v| {
                v.bjets().pt_at(i)
            });
        }

        for i in 0..4 {
            c.push(format!("truth_id{i}"), Int, None, move |v| {
                v.jets().get(i).map_or(SENTINEL, |j| jet_flavor(j) as f64)
            });
        }
        c.push("jet_1_btag", Bool, None, move |v| {
            let tagged = v.jets().first().is_some_and(|j| j.pass(btag));
            if tagged { 1.0 } else { 0.0 }
        });

        for i in 0..6 {
            for k in i + 1..6 {
                c.push(format!("dR_j{}_j{}", i + 1, k + 1), Float, DELTA_R, move |v| {
                    delta_r_at(v.jets(), i, k)
                });
            }
        }
        for i in 0..4 {
            for k in i + 1..4 {
                c.push(format!("dR_bj{}_bj{}", i + 1, k + 1), Float, DELTA_R, move |v| {
                    delta_r_at(v.bjets(), i, k)
                });
            }
        }
        c.push("dR_l1_l2", Float, DELTA_R, |v| delta_r_at(v.leptons(), 0, 1));

        c
    }

    fn push<F>(&mut self, name: impl Into<String>, column: ColumnType, binning: Option<Binning>, f: F)
    where
        F: Fn(&EventView<'_>) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        Arc::make_mut(&mut self.index).insert(name.clone(), self.defs.len());
        self.defs.push(VariableDef { name, column, binning, compute: Box::new(f) });
    }

    /// Add a variable. Names must be unique.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        column: ColumnType,
        binning: Option<Binning>,
        f: F,
    ) -> Result<()>
    where
        F: Fn(&EventView<'_>) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::Config(format!("variable '{name}' registered twice")));
        }
        if let Some(b) = &binning {
            b.validate()?;
        }
        self.push(name, column, binning, f);
        Ok(())
    }

    /// Override (or add) the histogram binning of an existing variable.
    pub fn set_binning(&mut self, name: &str, binning: Binning) -> Result<()> {
        binning.validate()?;
        let &i = self.index.get(name).ok_or_else(|| {
            Error::Config(format!("histogram binning given for unknown variable '{name}'"))
        })?;
        self.defs[i].binning = Some(binning);
        Ok(())
    }

    /// Position of `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Variables in order.
    pub fn defs(&self) -> &[VariableDef] {
        &self.defs
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Values of every catalogue variable for one event, in catalogue order.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedVariableSet {
    index: Arc<HashMap<String, usize>>,
    values: Vec<f64>,
}

impl DerivedVariableSet {
    /// Value of `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    /// All values in catalogue order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Evaluate the whole catalogue on one event.
pub fn derive(catalogue: &VariableCatalogue, view: &EventView<'_>) -> DerivedVariableSet {
    DerivedVariableSet {
        index: Arc::clone(&catalogue.index),
        values: catalogue.defs.iter().map(|d| (d.compute)(view)).collect(),
    }
}
