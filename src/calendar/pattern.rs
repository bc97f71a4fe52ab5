//! Weekly operating patterns and the per-journey calendar rules.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// The seven operating-day flags of a journey, Monday first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    pub const EMPTY: WeekdayMask = WeekdayMask(0);
    pub const ALL: WeekdayMask = WeekdayMask(0b111_1111);

    /// Parse a seven character `0`/`1` string, Monday first (e.g. `"1010100"`).
    ///
    /// Returns `None` for any other length or character.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 7 {
            return None;
        }
        let mut bits = 0u8;
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'1' => bits |= 1 << i,
                b'0' => {}
                _ => return None,
            }
        }
        Some(WeekdayMask(bits))
    }

    pub fn from_days(days: &[Weekday]) -> Self {
        let mut mask = WeekdayMask::EMPTY;
        for day in days {
            mask.insert(*day);
        }
        mask
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    /// Whether `date` falls on one of the operating days.
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.contains(date.weekday())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Operating flags in GTFS column order, Monday to Sunday.
    pub fn flags(&self) -> [bool; 7] {
        let mut flags = [false; 7];
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag = self.0 & (1 << i) != 0;
        }
        flags
    }
}

impl fmt::Display for WeekdayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in self.flags() {
            f.write_str(if flag { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for WeekdayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeekdayMask({})", self)
    }
}

/// School-term restriction carried by a journey header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchoolTermRule {
    #[default]
    Always,
    TermTimeOnly,
    HolidaysOnly,
}

impl SchoolTermRule {
    /// `S` is term time only, `H` school holidays only, anything else always.
    pub fn from_indicator(indicator: u8) -> Self {
        match indicator {
            b'S' => SchoolTermRule::TermTimeOnly,
            b'H' => SchoolTermRule::HolidaysOnly,
            _ => SchoolTermRule::Always,
        }
    }
}

/// Bank-holiday rule carried by a journey header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BankHolidayRule {
    /// Bank holidays are ordinary days.
    #[default]
    Normal,
    /// Runs on its weekdays and additionally on every bank holiday.
    AlsoOn,
    /// Runs on bank holidays and nowhere else.
    Only,
    /// Suppressed on bank holidays.
    Excluded,
}

impl BankHolidayRule {
    pub fn from_indicator(indicator: u8) -> Self {
        match indicator {
            b'A' => BankHolidayRule::AlsoOn,
            b'B' => BankHolidayRule::Only,
            b'X' => BankHolidayRule::Excluded,
            _ => BankHolidayRule::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionKind {
    Add,
    Remove,
}

/// Everything needed to decide on which dates a journey operates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingPattern {
    pub weekdays: WeekdayMask,
    /// First date of validity, inclusive.
    pub start: NaiveDate,
    /// Last date of validity, inclusive.
    pub end: NaiveDate,
    pub school: SchoolTermRule,
    pub bank_holidays: BankHolidayRule,
    exceptions: BTreeMap<NaiveDate, ExceptionKind>,
}

impl OperatingPattern {
    pub fn new(weekdays: WeekdayMask, start: NaiveDate, end: NaiveDate) -> Self {
        OperatingPattern {
            weekdays,
            start,
            end,
            school: SchoolTermRule::Always,
            bank_holidays: BankHolidayRule::Normal,
            exceptions: BTreeMap::new(),
        }
    }

    /// Record a one-off exception. A removal always overrides an addition on the same date.
    pub fn add_exception(&mut self, date: NaiveDate, kind: ExceptionKind) {
        match self.exceptions.entry(date) {
            Entry::Vacant(entry) => {
                entry.insert(kind);
            }
            Entry::Occupied(mut entry) => {
                if kind == ExceptionKind::Remove {
                    entry.insert(kind);
                }
            }
        }
    }

    /// Record the same exception for every date of an inclusive range.
    pub fn add_exception_range(&mut self, start: NaiveDate, end: NaiveDate, kind: ExceptionKind) {
        for date in days_between(start, end) {
            self.add_exception(date, kind);
        }
    }

    /// One-off exceptions in date order.
    pub fn exceptions(&self) -> impl Iterator<Item = (NaiveDate, ExceptionKind)> + '_ {
        self.exceptions.iter().map(|(date, kind)| (*date, *kind))
    }

    /// Every date of the validity range, whatever its weekday.
    pub fn validity(&self) -> impl Iterator<Item = NaiveDate> {
        days_between(self.start, self.end)
    }
}

/// Inclusive day iterator; empty when `start` is after `end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
