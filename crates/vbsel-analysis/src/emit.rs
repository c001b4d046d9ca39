//! Hand-off of derived variables to the histogram sink and row writer.

use std::collections::HashSet;

use vbsel_core::{Error, FieldValue, HistogramSink, Result, RowWriter};
use vbsel_io::{Binning, ColumnType, HistogramBook, NtupleSchema};

use crate::regions::{RegionClassifier, RegionSet};
use crate::variables::{DerivedVariableSet, VariableCatalogue};

/// Prefix of the per-region boolean ntuple columns.
pub const REGION_COLUMN_PREFIX: &str = "region_";

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: ColumnType,
    var: usize,
}

/// Fixed mapping from catalogue slots to histogram and column names.
#[derive(Debug, Clone)]
pub struct OutputEmitter {
    histograms: Vec<(String, Binning, usize)>,
    columns: Vec<Column>,
    region_columns: Vec<String>,
}

impl OutputEmitter {
    /// Lay out outputs for `catalogue` and the regions of `classifier`.
    ///
    /// Every variable becomes a column; variables with a binning also become
    /// histograms. Each region adds a `region_<name>` boolean column.
    pub fn declare(catalogue: &VariableCatalogue, classifier: &RegionClassifier) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(catalogue.len());
        let mut histograms = Vec::new();
        for (var, def) in catalogue.defs().iter().enumerate() {
            seen.insert(def.name().to_string());
            columns.push(Column { name: def.name().to_string(), ty: def.column(), var });
            if let Some(b) = def.binning() {
                histograms.push((def.name().to_string(), b, var));
            }
        }
        let mut region_columns = Vec::with_capacity(classifier.names().len());
        for region in classifier.names().iter() {
            let col = format!("{REGION_COLUMN_PREFIX}{region}");
            if !seen.insert(col.clone()) {
                return Err(Error::Config(format!(
                    "region column '{col}' clashes with an existing variable"
                )));
            }
            region_columns.push(col);
        }
        Ok(Self { histograms, columns, region_columns })
    }

    /// Book every histogrammed variable.
    pub fn book(&self) -> Result<HistogramBook> {
        let mut book = HistogramBook::new();
        for (name, binning, _) in &self.histograms {
            book.book(name.as_str(), *binning)?;
        }
        Ok(book)
    }

    /// Ntuple schema: variable columns then region columns.
    pub fn schema(&self) -> Result<NtupleSchema> {
        let mut schema = NtupleSchema::new();
        for c in &self.columns {
            schema.add(c.name.as_str(), c.ty)?;
        }
        for r in &self.region_columns {
            schema.add(r.as_str(), ColumnType::Bool)?;
        }
        Ok(schema)
    }

    /// Check that `sink` and `writer` accept every name this emitter uses.
    pub fn validate(&self, sink: &impl HistogramSink, writer: &impl RowWriter) -> Result<()> {
        if let Some((name, ..)) = self.histograms.iter().find(|(n, ..)| !sink.is_declared(n)) {
            return Err(Error::UndeclaredHistogram(name.clone()));
        }
        let fields = self.columns.iter().map(|c| &c.name).chain(&self.region_columns);
        for name in fields {
            if !writer.has_field(name) {
                return Err(Error::UndeclaredField(name.clone()));
            }
        }
        Ok(())
    }

    /// Fill histograms with `weight` and write one complete row.
    pub fn emit(
        &self,
        vars: &DerivedVariableSet,
        regions: &RegionSet,
        weight: f64,
        sink: &mut impl HistogramSink,
        writer: &mut impl RowWriter,
    ) -> Result<()> {
        let values = vars.values();
        for (name, _, var) in &self.histograms {
            sink.fill(name, values[*var], weight)?;
        }
        for c in &self.columns {
            let v = values[c.var];
            let field = match c.ty {
                ColumnType::Float => FieldValue::Float(v),
                ColumnType::Int => FieldValue::Int(v as i64),
                ColumnType::Bool => FieldValue::Bool(v > 0.0),
            };
            writer.write_field(&c.name, field)?;
        }
        for (col, (_, accepted)) in self.region_columns.iter().zip(regions.iter()) {
            writer.write_field(col, FieldValue::Bool(accepted))?;
        }
        writer.end_row()
    }
}
