// SPDX-License-Identifier: Apache-2.0

//! Error record classifier.
//!
//! Only two fields of a record are looked at:
//! - header line: `{YYYYMMDDhhmmss,N,` (one leading character and a three
//!   character trailer around the compact timestamp)
//! - detail line: comma-delimited fields where `,17,E,` marks an error with
//!   code 17; the error text follows the marker and is closed by a two
//!   character trailer
//!
//! Widths count characters, not bytes.
//!
//! Everything else in the record is skipped without interpretation.
//!
//! Example detail line: `{2a,0},1,1,1,1,17,E,Connection refused,0`

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::receivers::lgp::error::{Error, Result};
use crate::receivers::lgp::reader::Record;

/// Detail-line marker for "severity = Error, code = 17"
pub const ERROR_MARKER: &str = ",17,E,";

/// Compact date-time encoding used in header lines
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Rendering used for result output
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER_PREFIX_WIDTH: usize = 1;
const HEADER_SUFFIX_WIDTH: usize = 3;
const DETAIL_SUFFIX_WIDTH: usize = 2;

/// An extracted error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(timestamp: NaiveDateTime, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp.format(DISPLAY_FORMAT), self.message)
    }
}

/// ErrorClassifier decides whether a record is an error and extracts it.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one record.
    ///
    /// Returns `Ok(None)` for records without the error marker. A record that
    /// carries the marker but cannot be decoded is an error: the external
    /// format has drifted and the extracted data would be wrong.
    pub fn classify(&self, record: &Record) -> Result<Option<ErrorEntry>> {
        let detail = record.detail();
        let Some(marker_pos) = detail.find(ERROR_MARKER) else {
            return Ok(None);
        };

        let message = extract_message(detail, marker_pos + ERROR_MARKER.len()).ok_or_else(|| {
            Error::Decode {
                line: record.detail_line(),
                reason: format!("error text missing or truncated in {:?}", detail),
            }
        })?;

        let timestamp = decode_timestamp(record.header()).map_err(|reason| Error::Decode {
            line: record.header_line(),
            reason,
        })?;

        Ok(Some(ErrorEntry::new(timestamp, message)))
    }
}

fn extract_message(detail: &str, start: usize) -> Option<&str> {
    let end = start_of_last_chars(detail, DETAIL_SUFFIX_WIDTH)?;
    if end < start {
        return None;
    }
    detail.get(start..end)
}

fn decode_timestamp(header: &str) -> std::result::Result<NaiveDateTime, String> {
    let raw = header
        .char_indices()
        .nth(HEADER_PREFIX_WIDTH)
        .map(|(start, _)| start)
        .zip(start_of_last_chars(header, HEADER_SUFFIX_WIDTH))
        .filter(|(start, end)| start <= end)
        .and_then(|(start, end)| header.get(start..end))
        .ok_or_else(|| format!("header line too short: {:?}", header))?;

    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

/// Byte index at which the last `n` characters of `s` begin
fn start_of_last_chars(s: &str, n: usize) -> Option<usize> {
    match n {
        0 => Some(s.len()),
        n => s.char_indices().rev().nth(n - 1).map(|(i, _)| i),
    }
}
