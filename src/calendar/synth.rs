//! Resolves operating patterns to concrete date sets and folds equal date
//! sets onto shared service calendars.

use crate::calendar::overrides::{BankHolidays, SchoolTerms};
use crate::calendar::pattern::{
    days_between, BankHolidayRule, ExceptionKind, OperatingPattern, SchoolTermRule, WeekdayMask,
};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Canonical calendar description of a set of operating dates.
///
/// Two journeys running on exactly the same dates always produce equal
/// signatures, whatever their original weekday flags and exceptions looked like.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarSignature {
    pub weekdays: WeekdayMask,
    /// First and last operating date, `None` for a journey that never runs.
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub additions: BTreeSet<NaiveDate>,
    pub removals: BTreeSet<NaiveDate>,
}

impl CalendarSignature {
    pub fn empty() -> Self {
        CalendarSignature {
            weekdays: WeekdayMask::EMPTY,
            range: None,
            additions: BTreeSet::new(),
            removals: BTreeSet::new(),
        }
    }

    /// Build the signature of a resolved date set.
    ///
    /// The range spans the first to the last date. A weekday joins the mask when
    /// it operates on at least half of its occurrences inside that range; every
    /// other date is expressed as an addition or a removal.
    pub fn from_dates(dates: &BTreeSet<NaiveDate>) -> Self {
        let (Some(first), Some(last)) = (dates.first().copied(), dates.last().copied()) else {
            return CalendarSignature::empty();
        };

        let mut running = [0usize; 7];
        let mut idle = [0usize; 7];
        for day in days_between(first, last) {
            let i = day.weekday().num_days_from_monday() as usize;
            if dates.contains(&day) {
                running[i] += 1;
            } else {
                idle[i] += 1;
            }
        }

        let mut weekdays = WeekdayMask::EMPTY;
        for day in first.iter_days().take(7) {
            let i = day.weekday().num_days_from_monday() as usize;
            if running[i] > 0 && running[i] >= idle[i] {
                weekdays.insert(day.weekday());
            }
        }

        let additions = dates
            .iter()
            .filter(|d| !weekdays.matches(**d))
            .copied()
            .collect();
        let removals = days_between(first, last)
            .filter(|d| weekdays.matches(*d) && !dates.contains(d))
            .collect();

        CalendarSignature {
            weekdays,
            range: Some((first, last)),
            additions,
            removals,
        }
    }

    /// The dates this signature describes.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        let Some((start, end)) = self.range else {
            return BTreeSet::new();
        };
        let mut dates: BTreeSet<NaiveDate> = days_between(start, end)
            .filter(|d| self.weekdays.matches(*d))
            .collect();
        dates.extend(self.additions.iter().copied());
        for date in &self.removals {
            dates.remove(date);
        }
        dates
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }
}

/// Identifier of a synthesized service calendar, minted in first-use order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub u32);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCalendar {
    pub id: ServiceId,
    pub signature: CalendarSignature,
}

/// Turns operating patterns into deduplicated service calendars.
pub struct CalendarSynthesizer<'a> {
    holidays: &'a BankHolidays,
    terms: &'a SchoolTerms,
    cache: HashMap<CalendarSignature, ServiceId>,
    calendars: Vec<ServiceCalendar>,
}

impl<'a> CalendarSynthesizer<'a> {
    pub fn new(holidays: &'a BankHolidays, terms: &'a SchoolTerms) -> Self {
        CalendarSynthesizer {
            holidays,
            terms,
            cache: HashMap::new(),
            calendars: Vec::new(),
        }
    }

    /// Concrete operating dates of a pattern.
    ///
    /// Applied in order: the weekday flags over the validity range, the
    /// bank-holiday rule, the school-term rule, then the one-off exceptions.
    pub fn resolve(&self, pattern: &OperatingPattern) -> BTreeSet<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = match pattern.bank_holidays {
            BankHolidayRule::Only => self.holidays.between(pattern.start, pattern.end).collect(),
            _ => pattern
                .validity()
                .filter(|d| pattern.weekdays.matches(*d))
                .collect(),
        };

        match pattern.bank_holidays {
            BankHolidayRule::AlsoOn => {
                dates.extend(self.holidays.between(pattern.start, pattern.end));
            }
            BankHolidayRule::Excluded => dates.retain(|d| !self.holidays.contains(*d)),
            BankHolidayRule::Normal | BankHolidayRule::Only => {}
        }

        match pattern.school {
            SchoolTermRule::TermTimeOnly => dates.retain(|d| self.terms.in_term(*d)),
            SchoolTermRule::HolidaysOnly => dates.retain(|d| !self.terms.in_term(*d)),
            SchoolTermRule::Always => {}
        }

        for (date, kind) in pattern.exceptions() {
            match kind {
                ExceptionKind::Add => {
                    dates.insert(date);
                }
                ExceptionKind::Remove => {
                    dates.remove(&date);
                }
            }
        }
        dates
    }

    pub fn signature(&self, pattern: &OperatingPattern) -> CalendarSignature {
        CalendarSignature::from_dates(&self.resolve(pattern))
    }

    /// Service id for the pattern, reusing an existing calendar when the
    /// resolved dates are identical.
    pub fn assign(&mut self, pattern: &OperatingPattern) -> ServiceId {
        let signature = self.signature(pattern);
        if let Some(id) = self.cache.get(&signature) {
            return *id;
        }
        let id = ServiceId(self.calendars.len() as u32 + 1);
        self.cache.insert(signature.clone(), id);
        self.calendars.push(ServiceCalendar { id, signature });
        id
    }

    /// Calendars minted so far, in id order.
    pub fn calendars(&self) -> &[ServiceCalendar] {
        &self.calendars
    }

    pub fn into_calendars(self) -> Vec<ServiceCalendar> {
        self.calendars
    }
}
