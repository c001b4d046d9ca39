//! Batched, optionally parallel event loop.
//!
//! Events are pulled from the source in batches. Each batch is split into
//! fixed-size chunks; every chunk fills its own histogram book, ntuple
//! buffer and cutflow, and chunk results are merged in chunk order. Output
//! rows therefore keep input order and the result is the same for any
//! thread count.

use arrow::record_batch::RecordBatch;
use rayon::prelude::*;

use vbsel_core::{EventRecord, EventSource, Result};
use vbsel_io::{HistogramBook, NtupleBuffer};

use crate::analysis::{Analysis, Cutflow, EventOutcome};
use crate::config::RunSettings;

/// Merged results of a run.
#[derive(Debug)]
pub struct RunOutput {
    /// Filled histograms.
    pub book: HistogramBook,
    /// One row per accepted event, in input order. Empty after
    /// [`run_events_streaming`], whose rows went to the callback.
    pub ntuple: NtupleBuffer,
    /// Event counts.
    pub cutflow: Cutflow,
}

struct ChunkResult {
    book: HistogramBook,
    ntuple: NtupleBuffer,
    cutflow: Cutflow,
}

impl RunOutput {
    fn new(analysis: &Analysis) -> Self {
        Self {
            book: analysis.new_book(),
            ntuple: analysis.new_ntuple(),
            cutflow: Cutflow::new(analysis.region_names()),
        }
    }

    fn absorb(&mut self, chunk: ChunkResult) -> Result<()> {
        self.book.merge(&chunk.book)?;
        self.ntuple.append(&chunk.ntuple)?;
        self.cutflow.merge(&chunk.cutflow)
    }
}

fn process_chunk(analysis: &Analysis, events: &[EventRecord], first: usize) -> Result<ChunkResult> {
    let mut book = analysis.new_book();
    let mut ntuple = analysis.new_ntuple();
    let mut cutflow = Cutflow::new(analysis.region_names());
    for (i, event) in events.iter().enumerate() {
        let outcome = analysis.process_event(event, &mut book, &mut ntuple)?;
        if let EventOutcome::Skipped(reason) = &outcome {
            tracing::debug!(event = first + i, reason = reason.as_str(), "event skipped");
        }
        cutflow.record(&outcome, event.weight());
    }
    Ok(ChunkResult { book, ntuple, cutflow })
}

fn process_batch(
    analysis: &Analysis,
    batch: &[EventRecord],
    offset: usize,
    settings: &RunSettings,
) -> Result<Vec<ChunkResult>> {
    let chunk_size = settings.chunk_size.max(1);
    if settings.threads == 1 {
        batch
            .chunks(chunk_size)
            .enumerate()
            .map(|(k, c)| process_chunk(analysis, c, offset + k * chunk_size))
            .collect()
    } else {
        batch
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(k, c)| process_chunk(analysis, c, offset + k * chunk_size))
            .collect()
    }
}

/// Drain `source` through `analysis`, keeping every row in memory.
///
/// `settings.threads == 1` processes on the calling thread; any other value
/// uses the current rayon pool.
pub fn run_events(
    analysis: &Analysis,
    source: &mut impl EventSource,
    settings: &RunSettings,
) -> Result<RunOutput> {
    drive(analysis, source, settings, None)
}

/// Drain `source` through `analysis`, passing the rows of each batch to
/// `on_rows` as one Arrow batch in input order.
///
/// Batches without accepted events are not passed on.
pub fn run_events_streaming(
    analysis: &Analysis,
    source: &mut impl EventSource,
    settings: &RunSettings,
    mut on_rows: impl FnMut(RecordBatch) -> Result<()>,
) -> Result<RunOutput> {
    let on_rows: &mut dyn FnMut(RecordBatch) -> Result<()> = &mut on_rows;
    drive(analysis, source, settings, Some(on_rows))
}

fn drive(
    analysis: &Analysis,
    source: &mut impl EventSource,
    settings: &RunSettings,
    mut on_rows: Option<&mut dyn FnMut(RecordBatch) -> Result<()>>,
) -> Result<RunOutput> {
    let batch_size = settings.batch_size.max(1);
    let mut out = RunOutput::new(analysis);
    let mut batch = Vec::with_capacity(batch_size);
    let mut offset = 0usize;
    let mut exhausted = false;

    while !exhausted {
        batch.clear();
        while batch.len() < batch_size {
            match source.next_event()? {
                Some(event) => batch.push(event),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            break;
        }
        for chunk in process_batch(analysis, &batch, offset, settings)? {
            out.absorb(chunk)?;
        }
        offset += batch.len();
        if let Some(f) = on_rows.as_mut()
            && out.ntuple.n_rows() > 0
        {
            f(out.ntuple.take_record_batch()?)?;
        }
        tracing::debug!(events = offset, accepted = out.cutflow.accepted, "batch done");
    }

    tracing::info!(
        processed = out.cutflow.processed,
        accepted = out.cutflow.accepted,
        skipped = out.cutflow.total_skipped(),
        "run complete"
    );
    Ok(out)
}
