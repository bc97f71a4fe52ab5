//! Externally supplied bank-holiday and school-term calendars.
//!
//! Both files share one format: one entry per line, either a single
//! `YYYYMMDD` date or a comma separated inclusive `YYYYMMDD,YYYYMMDD` range.

use crate::calendar::pattern::days_between;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("impossible to read calendar file")]
    IO(#[from] std::io::Error),
    #[error("impossible to read calendar csv")]
    Csv(#[from] csv::Error),
    #[error("line {line}: '{value}' is not a YYYYMMDD date")]
    BadDate { line: u64, value: String },
    #[error("line {line}: range ends before it starts")]
    InvertedRange { line: u64 },
}

/// Set of public holiday dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankHolidays(BTreeSet<NaiveDate>);

impl BankHolidays {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        BankHolidays(dates.into_iter().collect())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, OverrideError> {
        let mut dates = BTreeSet::new();
        for (start, end) in read_periods(reader)? {
            dates.extend(days_between(start, end));
        }
        Ok(BankHolidays(dates))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OverrideError> {
        BankHolidays::from_reader(File::open(path)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date)
    }

    /// Holidays inside the inclusive range.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        let range = if start <= end { Some(self.0.range(start..=end)) } else { None };
        range.into_iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// School term periods. With no data every date counts as term time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchoolTerms {
    #[default]
    AlwaysTerm,
    Periods(Vec<(NaiveDate, NaiveDate)>),
}

impl SchoolTerms {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, OverrideError> {
        let periods = read_periods(reader)?;
        if periods.is_empty() {
            Ok(SchoolTerms::AlwaysTerm)
        } else {
            Ok(SchoolTerms::Periods(periods))
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OverrideError> {
        SchoolTerms::from_reader(File::open(path)?)
    }

    pub fn in_term(&self, date: NaiveDate) -> bool {
        match self {
            SchoolTerms::AlwaysTerm => true,
            SchoolTerms::Periods(periods) => periods
                .iter()
                .any(|(start, end)| *start <= date && date <= *end),
        }
    }
}

fn read_periods<R: Read>(reader: R) -> Result<Vec<(NaiveDate, NaiveDate)>, OverrideError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut periods = Vec::new();
    let mut rec = csv::StringRecord::new();
    while reader.read_record(&mut rec)? {
        let line = rec.position().map(|p| p.line()).unwrap_or_default();
        let mut fields = rec.iter().filter(|f| !f.is_empty());
        let Some(first) = fields.next() else {
            continue;
        };
        let start = parse_date(first, line)?;
        let end = match fields.next() {
            Some(last) => parse_date(last, line)?,
            None => start,
        };
        if end < start {
            return Err(OverrideError::InvertedRange { line });
        }
        periods.push((start, end));
    }
    Ok(periods)
}

fn parse_date(value: &str, line: u64) -> Result<NaiveDate, OverrideError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| OverrideError::BadDate {
        line,
        value: value.to_owned(),
    })
}
