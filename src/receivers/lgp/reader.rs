// SPDX-License-Identifier: Apache-2.0

//! Fixed-stride record reader.
//!
//! The event log is a concatenation of records of exactly [`RECORD_STRIDE`]
//! physical lines. The reader counts positions in physical lines, never in
//! records, so a resume offset can point anywhere in the file.
//!
//! A physical line is only complete once its `\n` terminator has been
//! written. Lines that do not yet add up to a whole record stay buffered and
//! are not counted, which lets a producer append to the file while we read.

use std::collections::VecDeque;
use std::io::{self, BufRead};

use crate::receivers::lgp::error::{Error, Result};

/// Number of physical lines per record.
pub const RECORD_STRIDE: usize = 5;

/// Line offset of the first record in a log file (the file starts with a
/// fixed two-line header).
pub const START_OFFSET: u64 = 2;

const HEADER_INDEX: usize = 1;
const DETAIL_INDEX: usize = 2;

/// One record: a separator line, the header line, the detail line and two
/// payload lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    start_line: u64,
    lines: [String; RECORD_STRIDE],
}

impl Record {
    pub fn new(start_line: u64, lines: [String; RECORD_STRIDE]) -> Self {
        Self { start_line, lines }
    }

    /// Line offset of the record's first (separator) line
    pub fn start_line(&self) -> u64 {
        self.start_line
    }

    /// The header line, carrying the encoded timestamp
    pub fn header(&self) -> &str {
        &self.lines[HEADER_INDEX]
    }

    /// Line offset of the header line
    pub fn header_line(&self) -> u64 {
        self.start_line + HEADER_INDEX as u64
    }

    /// The detail line, carrying the severity marker and error text
    pub fn detail(&self) -> &str {
        &self.lines[DETAIL_INDEX]
    }

    /// Line offset of the detail line
    pub fn detail_line(&self) -> u64 {
        self.start_line + DETAIL_INDEX as u64
    }
}

/// Result of asking the reader for the next record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A full record was read and the position advanced by [`RECORD_STRIDE`]
    Record(Record),
    /// Fewer than [`RECORD_STRIDE`] complete lines remain; position unchanged
    EndOfStream,
}

/// RecordReader reads whole records from a line source
pub struct RecordReader<R> {
    inner: R,
    /// Physical lines consumed so far
    position: u64,
    /// Complete lines read past `position` that do not yet form a record
    pending: VecDeque<String>,
    /// Bytes of a trailing line whose terminator has not been written yet
    partial: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    /// Create a reader positioned at the start of the stream
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            pending: VecDeque::with_capacity(RECORD_STRIDE),
            partial: Vec::new(),
        }
    }

    /// Number of physical lines consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Skip lines until `offset` lines have been consumed.
    ///
    /// Fails with [`Error::TruncatedStream`] when the stream ends first, which
    /// means the offset does not belong to this file's current contents.
    pub fn advance_to(&mut self, offset: u64) -> Result<()> {
        if offset < self.position {
            return Err(Error::Rewind {
                position: self.position,
                offset,
            });
        }

        while self.position < offset {
            if self.pending.pop_front().is_none() && self.read_line()?.is_none() {
                return Err(Error::TruncatedStream {
                    expected: offset,
                    available: self.position,
                });
            }
            self.position += 1;
        }

        Ok(())
    }

    /// Read the next record.
    ///
    /// An incomplete trailing record is not consumed: the position stays where
    /// it was, and a later call picks the record up once the producer has
    /// finished writing it.
    pub fn next_record(&mut self) -> Result<ReadOutcome> {
        while self.pending.len() < RECORD_STRIDE {
            match self.read_line()? {
                Some(line) => self.pending.push_back(line),
                None => return Ok(ReadOutcome::EndOfStream),
            }
        }

        let lines: [String; RECORD_STRIDE] =
            std::array::from_fn(|_| self.pending.pop_front().unwrap_or_default());
        let record = Record::new(self.position, lines);
        self.position += RECORD_STRIDE as u64;

        Ok(ReadOutcome::Record(record))
    }

    /// Read one terminated line, or None when only an unterminated fragment
    /// (or nothing) is left.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.inner.read_until(b'\n', &mut self.partial)?;
        if self.partial.last() != Some(&b'\n') {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.partial);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
