//! Columnar per-event ntuple buffer.
//!
//! Fields are declared once in an [`NtupleSchema`]; an [`NtupleBuffer`]
//! accepts rows through the [`RowWriter`] protocol and stores them column
//! by column so they convert directly to an Arrow [`RecordBatch`].

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use vbsel_core::{Error, FieldValue, Result, RowWriter};

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit float.
    Float,
    /// 64-bit signed integer.
    Int,
    /// Boolean flag.
    Bool,
}

impl ColumnType {
    fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Float(_) => ColumnType::Float,
            FieldValue::Int(_) => ColumnType::Int,
            FieldValue::Bool(_) => ColumnType::Bool,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnType::Float => DataType::Float64,
            ColumnType::Int => DataType::Int64,
            ColumnType::Bool => DataType::Boolean,
        }
    }
}

/// Ordered, typed column declarations.
#[derive(Debug, Clone, Default)]
pub struct NtupleSchema {
    columns: Vec<(String, ColumnType)>,
    index: HashMap<String, usize>,
}

impl NtupleSchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a column. Duplicate names are rejected.
    pub fn add(&mut self, name: impl Into<String>, ty: ColumnType) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::Config(format!("ntuple field '{name}' declared twice")));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push((name, ty));
        Ok(())
    }

    /// Position of column `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Declared columns in order.
    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no columns are declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Arrow schema with non-nullable columns.
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, ty)| Field::new(name, ty.data_type(), false))
                .collect::<Vec<_>>(),
        )
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
}

impl ColumnData {
    fn empty(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Float => ColumnData::Float(Vec::new()),
            ColumnType::Int => ColumnData::Int(Vec::new()),
            ColumnType::Bool => ColumnData::Bool(Vec::new()),
        }
    }

    fn push(&mut self, value: FieldValue) {
        match (self, value) {
            (ColumnData::Float(v), FieldValue::Float(x)) => v.push(x),
            (ColumnData::Int(v), FieldValue::Int(x)) => v.push(x),
            (ColumnData::Bool(v), FieldValue::Bool(x)) => v.push(x),
            // Types are checked in `write_field`.
            _ => {}
        }
    }

    fn extend(&mut self, other: &ColumnData) {
        match (self, other) {
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend_from_slice(b),
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend_from_slice(b),
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend_from_slice(b),
            _ => {}
        }
    }

    /// Move the values out, leaving an empty column of the same type.
    fn take_array(&mut self) -> ArrayRef {
        match self {
            ColumnData::Float(v) => Arc::new(Float64Array::from(std::mem::take(v))),
            ColumnData::Int(v) => Arc::new(Int64Array::from(std::mem::take(v))),
            ColumnData::Bool(v) => Arc::new(BooleanArray::from(std::mem::take(v))),
        }
    }
}

/// Row buffer for one schema.
#[derive(Debug, Clone)]
pub struct NtupleBuffer {
    schema: Arc<NtupleSchema>,
    pending: Vec<Option<FieldValue>>,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl NtupleBuffer {
    /// Empty buffer.
    pub fn new(schema: Arc<NtupleSchema>) -> Self {
        let columns = schema.columns().iter().map(|(_, ty)| ColumnData::empty(*ty)).collect();
        Self { pending: vec![None; schema.len()], schema, columns, n_rows: 0 }
    }

    /// Schema shared by this buffer.
    pub fn schema(&self) -> &Arc<NtupleSchema> {
        &self.schema
    }

    /// Committed rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Float column `name`, if it exists and is a float column.
    pub fn column_f64(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(self.schema.index_of(name)?)? {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Int column `name`.
    pub fn column_i64(&self, name: &str) -> Option<&[i64]> {
        match self.columns.get(self.schema.index_of(name)?)? {
            ColumnData::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Bool column `name`.
    pub fn column_bool(&self, name: &str) -> Option<&[bool]> {
        match self.columns.get(self.schema.index_of(name)?)? {
            ColumnData::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Append all committed rows of `other`, which must share this schema.
    pub fn append(&mut self, other: &NtupleBuffer) -> Result<()> {
        if !Arc::ptr_eq(&self.schema, &other.schema)
            && self.schema.columns() != other.schema.columns()
        {
            return Err(Error::Validation("cannot append ntuple with a different schema".into()));
        }
        for (a, b) in self.columns.iter_mut().zip(&other.columns) {
            a.extend(b);
        }
        self.n_rows += other.n_rows;
        Ok(())
    }

    /// Discard a partially written row.
    pub fn clear_pending(&mut self) {
        self.pending.iter_mut().for_each(|p| *p = None);
    }

    /// Move committed rows into one Arrow batch and empty the buffer.
    ///
    /// A partially written row is kept.
    pub fn take_record_batch(&mut self) -> Result<RecordBatch> {
        let schema = Arc::new(self.schema.arrow_schema());
        self.n_rows = 0;
        if self.columns.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(ColumnData::take_array).collect();
        RecordBatch::try_new(schema, arrays).map_err(|e| Error::Validation(e.to_string()))
    }
}

impl RowWriter for NtupleBuffer {
    fn has_field(&self, name: &str) -> bool {
        self.schema.index_of(name).is_some()
    }

    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let i = self.schema.index_of(name).ok_or_else(|| Error::UndeclaredField(name.into()))?;
        let declared = self.schema.columns()[i].1;
        if ColumnType::of(&value) != declared {
            return Err(Error::Validation(format!(
                "field '{name}' is declared {declared:?}, got {value:?}"
            )));
        }
        if self.pending[i].is_some() {
            return Err(Error::Validation(format!("field '{name}' written twice in one row")));
        }
        self.pending[i] = Some(value);
        Ok(())
    }

    fn end_row(&mut self) -> Result<()> {
        if let Some(i) = self.pending.iter().position(Option::is_none) {
            let name = &self.schema.columns()[i].0;
            return Err(Error::Validation(format!("row ended without field '{name}'")));
        }
        for (col, slot) in self.columns.iter_mut().zip(self.pending.iter_mut()) {
            if let Some(v) = slot.take() {
                col.push(v);
            }
        }
        self.n_rows += 1;
        Ok(())
    }
}
