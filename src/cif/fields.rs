//! Fixed-width column access for one record line.
//!
//! Columns are addressed by byte offset. Sources are not guaranteed to be
//! UTF-8, so text is decoded lossily one field at a time.

use crate::cif::error::DecodeError;
use chrono::NaiveDate;
use std::fmt;
use std::ops::Range;

/// A date column, or the open-ended marker (blank or `99999999`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Date(NaiveDate),
    Open,
}

impl DateField {
    pub fn or(self, fallback: NaiveDate) -> NaiveDate {
        match self {
            DateField::Date(date) => date,
            DateField::Open => fallback,
        }
    }
}

/// `HHMM` time of day as minutes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(pub u16);

impl ClockTime {
    pub fn minutes(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.0 / 60, self.0 % 60)
    }
}

pub(crate) struct Fields<'a> {
    code: &'static str,
    line: &'a [u8],
}

impl<'a> Fields<'a> {
    /// Wrap a line, rejecting it when shorter than `needed` bytes.
    pub fn new(code: &'static str, line: &'a str, needed: usize) -> Result<Self, DecodeError> {
        let line = line.trim_end_matches(['\r', '\n']).as_bytes();
        if line.len() < needed {
            return Err(DecodeError::Truncated {
                code,
                needed,
                found: line.len(),
            });
        }
        Ok(Fields { code, line })
    }

    pub fn raw(&self, range: Range<usize>) -> &'a [u8] {
        let end = range.end.min(self.line.len());
        let start = range.start.min(end);
        &self.line[start..end]
    }

    pub fn byte(&self, at: usize) -> u8 {
        self.line.get(at).copied().unwrap_or(b' ')
    }

    /// Trimmed text of a column.
    pub fn text(&self, range: Range<usize>) -> String {
        String::from_utf8_lossy(self.raw(range)).trim().to_owned()
    }

    /// Trimmed text of a column, `None` when blank.
    pub fn opt_text(&self, range: Range<usize>) -> Option<String> {
        Some(self.text(range)).filter(|s| !s.is_empty())
    }

    /// Trimmed text from `start` to the end of the line.
    pub fn rest(&self, start: usize) -> String {
        self.text(start..self.line.len())
    }

    pub fn date(&self, range: Range<usize>, field: &'static str) -> Result<DateField, DecodeError> {
        let raw = self.raw(range);
        if raw.iter().all(|b| *b == b' ') || raw == b"99999999" {
            return Ok(DateField::Open);
        }
        std::str::from_utf8(raw)
            .ok()
            .filter(|s| s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok())
            .map(DateField::Date)
            .ok_or_else(|| self.malformed(field, raw))
    }

    pub fn time(&self, range: Range<usize>, field: &'static str) -> Result<ClockTime, DecodeError> {
        let raw = self.raw(range);
        if raw.len() != 4 || !raw.iter().all(|b| b.is_ascii_digit()) {
            return Err(self.malformed(field, raw));
        }
        let digit = |i: usize| (raw[i] - b'0') as u16;
        let hours = digit(0) * 10 + digit(1);
        let minutes = digit(2) * 10 + digit(3);
        if minutes >= 60 {
            return Err(self.malformed(field, raw));
        }
        Ok(ClockTime(hours * 60 + minutes))
    }

    pub fn malformed(&self, field: &'static str, raw: &[u8]) -> DecodeError {
        DecodeError::Malformed {
            code: self.code,
            field,
            value: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}
