//! Parquet read/write for ntuple batches.

use std::fs::File;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Error type for Parquet operations.
#[derive(Debug, thiserror::Error)]
pub enum ParquetError {
    /// Encoder/decoder failure.
    #[error("Parquet read/write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow failure while assembling batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// File system failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParquetError> for vbsel_core::Error {
    fn from(e: ParquetError) -> Self {
        match e {
            ParquetError::Io(io) => vbsel_core::Error::Io(io),
            other => vbsel_core::Error::Validation(other.to_string()),
        }
    }
}

/// Rows per row group; bounds what the encoder holds before flushing.
const MAX_ROW_GROUP_SIZE: usize = 64 * 1024;

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(MAX_ROW_GROUP_SIZE)
        .build()
}

/// Parquet file written incrementally, one batch at a time.
///
/// The file is only valid after [`ParquetFileWriter::close`].
pub struct ParquetFileWriter {
    writer: ArrowWriter<File>,
    rows: usize,
}

impl ParquetFileWriter {
    /// Create `path` for batches of `schema`.
    pub fn create(path: &Path, schema: SchemaRef) -> Result<Self, ParquetError> {
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, schema, Some(writer_properties()))?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append one batch.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<(), ParquetError> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    /// Rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flush the last row group and write the footer. Returns the row count.
    pub fn close(self) -> Result<usize, ParquetError> {
        self.writer.close()?;
        Ok(self.rows)
    }
}

/// Write batches to a Parquet file.
///
/// An empty batch list still produces no file; callers that always want an
/// output should pass at least one (possibly empty) batch.
pub fn write_parquet(path: &Path, batches: &[RecordBatch]) -> Result<(), ParquetError> {
    let Some(first) = batches.first() else {
        return Ok(());
    };
    let mut writer = ParquetFileWriter::create(path, first.schema())?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Write batches to Parquet bytes in memory.
pub fn write_parquet_bytes(batches: &[RecordBatch]) -> Result<Vec<u8>, ParquetError> {
    let Some(first) = batches.first() else {
        return Ok(vec![]);
    };
    let mut buf = Vec::new();
    {
        let mut writer =
            ArrowWriter::try_new(&mut buf, first.schema(), Some(writer_properties()))?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
    }
    Ok(buf)
}

/// Read a Parquet file into batches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, ParquetError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<_>, _> = reader.collect();
    Ok(batches?)
}

/// Read Parquet data from memory.
pub fn read_parquet_bytes(data: &[u8]) -> Result<Vec<RecordBatch>, ParquetError> {
    let buf = bytes::Bytes::copy_from_slice(data);
    let reader = ParquetRecordBatchReaderBuilder::try_new(buf)?.build()?;
    let batches: Result<Vec<_>, _> = reader.collect();
    Ok(batches?)
}
