//! Fixed-width 1-D histograms.

use serde::{Deserialize, Serialize};

use vbsel_core::{Error, Result};

/// Regular binning: `n_bins` equal bins on `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Binning {
    /// Number of bins (excluding under/overflow).
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub lo: f64,
    /// Upper edge of the last bin.
    pub hi: f64,
}

/// Where a value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinIndex {
    /// Below `lo` (or NaN).
    Underflow,
    /// In-range bin.
    Bin(usize),
    /// At or above `hi`.
    Overflow,
}

impl Binning {
    /// Checked constructor.
    pub fn new(n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        let b = Binning { n_bins, lo, hi };
        b.validate()?;
        Ok(b)
    }

    /// Reject empty or inverted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_bins == 0 {
            return Err(Error::Config("binning needs at least one bin".into()));
        }
        if !(self.lo.is_finite() && self.hi.is_finite() && self.lo < self.hi) {
            return Err(Error::Config(format!("invalid bin range [{}, {})", self.lo, self.hi)));
        }
        Ok(())
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.hi - self.lo) / self.n_bins as f64
    }

    /// Locate `x`.
    pub fn find_bin(&self, x: f64) -> BinIndex {
        if x.is_nan() || x < self.lo {
            return BinIndex::Underflow;
        }
        if x >= self.hi {
            return BinIndex::Overflow;
        }
        let i = ((x - self.lo) / self.width()) as usize;
        BinIndex::Bin(i.min(self.n_bins - 1))
    }
}

/// A weighted 1-D histogram with under/overflow bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Binning.
    pub binning: Binning,
    /// Sum of weights per bin.
    pub bin_content: Vec<f64>,
    /// Sum of squared weights per bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights below range.
    pub underflow: f64,
    /// Sum of weights above range.
    pub overflow: f64,
    /// Number of fills, including under/overflow.
    pub entries: u64,
}

impl Histogram {
    /// Empty histogram.
    pub fn new(name: impl Into<String>, binning: Binning) -> Self {
        Self {
            name: name.into(),
            binning,
            bin_content: vec![0.0; binning.n_bins],
            sumw2: vec![0.0; binning.n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    /// Add one weighted entry.
    pub fn fill(&mut self, value: f64, weight: f64) {
        self.entries += 1;
        match self.binning.find_bin(value) {
            BinIndex::Underflow => self.underflow += weight,
            BinIndex::Overflow => self.overflow += weight,
            BinIndex::Bin(i) => {
                self.bin_content[i] += weight;
                self.sumw2[i] += weight * weight;
            }
        }
    }

    /// Sum of in-range weights.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Add another histogram with identical binning into this one.
    pub fn merge(&mut self, other: &Histogram) -> Result<()> {
        if self.binning != other.binning {
            return Err(Error::Validation(format!(
                "cannot merge histogram '{}' with different binning",
                self.name
            )));
        }
        for (a, b) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_binning_centres_integers() {
        // The counting histograms use 20 bins on [-0.5, 19.5).
        let b = Binning::new(20, -0.5, 19.5).unwrap();
        assert_eq!(b.find_bin(0.0), BinIndex::Bin(0));
        assert_eq!(b.find_bin(4.0), BinIndex::Bin(4));
        assert_eq!(b.find_bin(19.0), BinIndex::Bin(19));
        assert_eq!(b.find_bin(19.5), BinIndex::Overflow);
        assert_eq!(b.find_bin(-999.0), BinIndex::Underflow);
        assert_eq!(b.find_bin(f64::NAN), BinIndex::Underflow);
    }

    #[test]
    fn invalid_binning() {
        assert!(Binning::new(0, 0.0, 1.0).is_err());
        assert!(Binning::new(10, 1.0, 1.0).is_err());
        assert!(Binning::new(10, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn fill_with_weights_and_flows() {
        let mut h = Histogram::new("met", Binning::new(2, 0.0, 2.0).unwrap());
        h.fill(0.5, 2.0);
        h.fill(1.5, 3.0);
        h.fill(0.2, 1.0);
        h.fill(-999.0, 1.0);
        h.fill(5.0, 0.5);
        assert_eq!(h.bin_content, vec![3.0, 3.0]);
        assert_eq!(h.sumw2, vec![5.0, 9.0]);
        assert_eq!(h.underflow, 1.0);
        assert_eq!(h.overflow, 0.5);
        assert_eq!(h.entries, 5);
        assert_eq!(h.integral(), 6.0);
    }

    #[test]
    fn merge_adds_contents() {
        let b = Binning::new(2, 0.0, 2.0).unwrap();
        let mut a = Histogram::new("x", b);
        let mut c = Histogram::new("x", b);
        a.fill(0.5, 1.0);
        c.fill(1.5, 2.0);
        c.fill(3.0, 1.0);
        a.merge(&c).unwrap();
        assert_eq!(a.bin_content, vec![1.0, 2.0]);
        assert_eq!(a.overflow, 1.0);
        assert_eq!(a.entries, 3);

        let other = Histogram::new("x", Binning::new(3, 0.0, 2.0).unwrap());
        assert!(a.merge(&other).is_err());
    }
}
