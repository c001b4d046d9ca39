//! Named collection of booked histograms.

use std::collections::HashMap;

use vbsel_core::{Error, HistogramSink, Result};

use crate::histogram::{Binning, Histogram};

/// Histograms booked at setup and filled by name.
///
/// Booking order is preserved, so two books built from the same
/// declarations can be merged slot by slot.
#[derive(Debug, Clone, Default)]
pub struct HistogramBook {
    histograms: Vec<Histogram>,
    index: HashMap<String, usize>,
}

impl HistogramBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a histogram. Booking the same name twice is an error.
    pub fn book(&mut self, name: impl Into<String>, binning: Binning) -> Result<()> {
        let name = name.into();
        binning.validate()?;
        if self.index.contains_key(&name) {
            return Err(Error::Config(format!("histogram '{name}' booked twice")));
        }
        self.index.insert(name.clone(), self.histograms.len());
        self.histograms.push(Histogram::new(name, binning));
        Ok(())
    }

    /// Same bookings with all contents reset.
    pub fn empty_clone(&self) -> Self {
        Self {
            histograms: self.histograms.iter().map(|h| Histogram::new(&h.name, h.binning)).collect(),
            index: self.index.clone(),
        }
    }

    /// Histogram by name.
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.index.get(name).map(|&i| &self.histograms[i])
    }

    /// All histograms in booking order.
    pub fn histograms(&self) -> &[Histogram] {
        &self.histograms
    }

    /// Number of booked histograms.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Whether nothing is booked.
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Add every histogram of `other` into the matching booking here.
    pub fn merge(&mut self, other: &HistogramBook) -> Result<()> {
        for h in &other.histograms {
            let &slot =
                self.index.get(&h.name).ok_or_else(|| Error::UndeclaredHistogram(h.name.clone()))?;
            self.histograms[slot].merge(h)?;
        }
        Ok(())
    }
}

impl HistogramSink for HistogramBook {
    fn is_declared(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn fill(&mut self, name: &str, value: f64, weight: f64) -> Result<()> {
        let &slot =
            self.index.get(name).ok_or_else(|| Error::UndeclaredHistogram(name.to_string()))?;
        self.histograms[slot].fill(value, weight);
        Ok(())
    }
}
