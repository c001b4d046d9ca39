//! JSON-lines event source.
//!
//! Each non-blank line holds one [`EventRecord`]. Object collections must
//! already be ordered by descending pt; a record that is not is rejected
//! with its line number rather than silently re-sorted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use vbsel_core::{Error, EventRecord, EventSource, Result};

/// Streaming reader of one JSON event per line.
#[derive(Debug)]
pub struct JsonlEventSource<R: BufRead> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonlEventSource<BufReader<File>> {
    /// Open a file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlEventSource<R> {
    /// Wrap any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self { reader, line: 0, buf: String::new() }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> EventSource for JsonlEventSource<R> {
    fn next_event(&mut self) -> Result<Option<EventRecord>> {
        loop {
            self.buf.clear();
            let read = match self.reader.read_line(&mut self.buf) {
                Ok(n) => n,
                // The offending line is consumed; count it.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    self.line += 1;
                    return Err(Error::Source { line: self.line, message: e.to_string() });
                }
                Err(e) => return Err(Error::Io(e)),
            };
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            let event: EventRecord = serde_json::from_str(text)
                .map_err(|e| Error::Source { line: self.line, message: e.to_string() })?;
            if let Some(kind) = event.unsorted_collection() {
                return Err(Error::Source {
                    line: self.line,
                    message: format!("{} are not ordered by descending pt", kind.as_str()),
                });
            }
            if !(event.met.et.is_finite() && event.met.et >= 0.0 && event.met.phi.is_finite()) {
                return Err(Error::Source {
                    line: self.line,
                    message: format!("met must be finite with non-negative et, got {}", event.met.et),
                });
            }
            return Ok(Some(event));
        }
    }
}
