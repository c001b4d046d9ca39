//! Analysis configuration.
//!
//! Every section is optional; omitted sections keep the standard working
//! points. A section that is given replaces the default as a whole, so a
//! `baseline:` block must list all four object kinds.
//!
//! ```yaml
//! min_signal_jets: 4
//! regions:
//!   SR_2b: "bjets_n >= 2 && meff_4j > 800"
//! histograms:
//!   Z_pt: { n_bins: 50, lo: 0, hi: 500 }
//! threads: 0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use vbsel_core::{Error, Result};
use vbsel_io::Binning;

use crate::filter::ObjectCut;
use crate::overlap::OverlapStep;
use crate::pipeline::{BJetPartition, BadJetVeto, CutSet, SelectionPipeline};

/// Execution settings for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Worker threads; `0` lets rayon decide, `1` runs sequentially.
    pub threads: usize,
    /// Events read from the source before processing.
    pub batch_size: usize,
    /// Events per parallel work unit. Fixed so results do not depend on
    /// the thread count.
    pub chunk_size: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { threads: 0, batch_size: 16_384, chunk_size: 512 }
    }
}

/// Full analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Baseline object cuts.
    pub baseline: CutSet,
    /// Bad-jet event veto.
    pub bad_jet_veto: BadJetVeto,
    /// Jet vertex-association filter.
    pub jet_quality: ObjectCut,
    /// Ordered overlap removal plan.
    pub overlap: Vec<OverlapStep>,
    /// Signal object cuts.
    pub signal: CutSet,
    /// B-jet partition of signal jets.
    pub bjet_partition: BJetPartition,
    /// Minimum number of signal jets.
    pub min_signal_jets: usize,
    /// Leading b-jets scanned by `mTb_min` (all when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtb_max_jets: Option<usize>,
    /// Extra regions: name → cut expression.
    pub regions: BTreeMap<String, String>,
    /// Histogram binning overrides: variable name → binning.
    pub histograms: BTreeMap<String, Binning>,
    /// Worker threads (0 = auto).
    pub threads: usize,
    /// Events per read batch.
    pub batch_size: usize,
    /// Events per parallel work unit.
    pub chunk_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let p = SelectionPipeline::default();
        let run = RunSettings::default();
        Self {
            baseline: p.baseline,
            bad_jet_veto: p.bad_jet_veto,
            jet_quality: p.jet_quality,
            overlap: p.overlap,
            signal: p.signal,
            bjet_partition: p.bjet_partition,
            min_signal_jets: p.min_signal_jets,
            mtb_max_jets: None,
            regions: BTreeMap::new(),
            histograms: BTreeMap::new(),
            threads: run.threads,
            batch_size: run.batch_size,
            chunk_size: run.chunk_size,
        }
    }
}

impl AnalysisConfig {
    /// Read YAML, or JSON when the extension is `.json`, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: Self =
            if is_json { serde_json::from_str(&text)? } else { serde_yaml_ng::from_str(&text)? };
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text and validate.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// YAML rendering.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Structural checks that need no variable catalogue.
    ///
    /// Region expressions and histogram names are resolved later, when the
    /// analysis is built.
    pub fn validate(&self) -> Result<()> {
        for step in &self.overlap {
            step.validate()?;
        }
        for (name, binning) in &self.histograms {
            binning
                .validate()
                .map_err(|e| Error::Config(format!("histogram '{name}': {e}")))?;
        }
        let cuts = [&self.baseline, &self.signal]
            .into_iter()
            .flat_map(|s| [s.electrons, s.muons, s.taus, s.jets])
            .chain([self.jet_quality]);
        for cut in cuts {
            if !(cut.pt_min.is_finite() && cut.eta_max.is_finite() && cut.eta_max >= 0.0) {
                return Err(Error::Config(format!(
                    "invalid object cut pt > {}, |eta| < {}",
                    cut.pt_min, cut.eta_max
                )));
            }
        }
        let windows = [
            ("bad_jet_veto", self.bad_jet_veto.pt_min, self.bad_jet_veto.eta_max),
            ("bjet_partition", self.bjet_partition.pt_min, self.bjet_partition.eta_max),
        ];
        for (stage, pt_min, eta_max) in windows {
            if !(pt_min.is_finite() && pt_min >= 0.0 && eta_max.is_finite() && eta_max >= 0.0) {
                return Err(Error::Config(format!(
                    "{stage}: invalid window pt > {pt_min}, |eta| < {eta_max}"
                )));
            }
        }
        if self.batch_size == 0 || self.chunk_size == 0 {
            return Err(Error::Config("batch_size and chunk_size must be positive".into()));
        }
        Ok(())
    }

    /// Selection stages described by this configuration.
    pub fn pipeline(&self) -> SelectionPipeline {
        SelectionPipeline {
            baseline: self.baseline,
            bad_jet_veto: self.bad_jet_veto,
            jet_quality: self.jet_quality,
            overlap: self.overlap.clone(),
            signal: self.signal,
            bjet_partition: self.bjet_partition,
            min_signal_jets: self.min_signal_jets,
        }
    }

    /// Execution settings.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings { threads: self.threads, batch_size: self.batch_size, chunk_size: self.chunk_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::{OverlapVeto, RadiusRule};
    use vbsel_core::{ObjectFlags, ObjectKind};

    #[test]
    fn empty_document_gives_defaults() {
        let c = AnalysisConfig::from_yaml("{}").unwrap();
        assert_eq!(c, AnalysisConfig::default());
        assert_eq!(c.min_signal_jets, 4);
        assert_eq!(c.overlap.len(), 5);
        assert_eq!(c.baseline.jets.pt_min, 20.0);
        assert_eq!(c.signal.electrons.eta_max, 2.47);
    }

    #[test]
    fn defaults_roundtrip_through_yaml() {
        let yaml = AnalysisConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("BTag77MV2c10"));
        let back = AnalysisConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back, AnalysisConfig::default());
    }

    #[test]
    fn partial_override() {
        let yaml = r#"
min_signal_jets: 3
mtb_max_jets: 2
threads: 1
regions:
  SR_2b: "bjets_n >= 2"
histograms:
  Z_pt: { n_bins: 50, lo: 0, hi: 500 }
jet_quality:
  pt_min: 25
  eta_max: 2.8
  flags:
    require: [JVT50Jet]
overlap:
  - primary: jets
    secondary: electrons
    radius: !fixed 0.2
    veto: !primary_has { require: [BTag77MV2c10] }
"#;
        let c = AnalysisConfig::from_yaml(yaml).unwrap();
        assert_eq!(c.min_signal_jets, 3);
        assert_eq!(c.mtb_max_jets, Some(2));
        assert_eq!(c.regions["SR_2b"], "bjets_n >= 2");
        assert_eq!(c.histograms["Z_pt"].n_bins, 50);
        assert_eq!(c.jet_quality.pt_min, 25.0);
        assert!(c.jet_quality.flags.matches(ObjectFlags::JVT50_JET));
        assert_eq!(c.overlap.len(), 1);
        assert_eq!(c.overlap[0].primary, ObjectKind::Jets);
        assert_eq!(c.overlap[0].radius, RadiusRule::Fixed(0.2));
        assert!(matches!(c.overlap[0].veto, OverlapVeto::PrimaryHas(_)));
        assert_eq!(c.run_settings().threads, 1);
        assert_eq!(c.pipeline().min_signal_jets, 3);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(AnalysisConfig::from_yaml("min_jets: 4").is_err());
        assert!(AnalysisConfig::from_yaml("batch_size: 0").is_err());
        assert!(
            AnalysisConfig::from_yaml("histograms:\n  met: { n_bins: 0, lo: 0, hi: 1 }").is_err()
        );
        let self_overlap = "overlap:\n  - { primary: jets, secondary: jets, radius: !fixed 0.4 }";
        assert!(AnalysisConfig::from_yaml(self_overlap).is_err());
        assert!(AnalysisConfig::from_yaml("jet_quality: { eta_max: -1 }").is_err());
    }

    #[test]
    fn rejects_bad_veto_and_partition_windows() {
        let cases = [
            ("bad_jet_veto: { pt_min: -20, eta_max: 5, quality: [LooseBadJet] }", "bad_jet_veto"),
            ("bad_jet_veto: { pt_min: 20, eta_max: .nan, quality: [LooseBadJet] }", "bad_jet_veto"),
            ("bjet_partition: { pt_min: 30, eta_max: -2.5, tag: [BTag77MV2c10] }", "bjet_partition"),
            ("bjet_partition: { pt_min: .inf, eta_max: 2.5, tag: [BTag77MV2c10] }", "bjet_partition"),
        ];
        for (yaml, stage) in cases {
            let err = AnalysisConfig::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{yaml}: {err}");
            assert!(err.to_string().contains(stage), "{yaml}: {err}");
        }
        let ok = "bjet_partition: { pt_min: 0, eta_max: 2.5, tag: [BTag77MV2c10] }";
        assert_eq!(AnalysisConfig::from_yaml(ok).unwrap().bjet_partition.eta_max, 2.5);
    }

    #[test]
    fn load_by_extension() {
        let dir = std::env::temp_dir().join(format!("vbsel_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let json = dir.join("analysis.json");
        std::fs::write(&json, r#"{"min_signal_jets": 2}"#).unwrap();
        assert_eq!(AnalysisConfig::load(&json).unwrap().min_signal_jets, 2);
        let yaml = dir.join("analysis.yaml");
        std::fs::write(&yaml, "min_signal_jets: 5\n").unwrap();
        assert_eq!(AnalysisConfig::load(&yaml).unwrap().min_signal_jets, 5);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
