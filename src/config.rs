use crate::calendar::{BankHolidays, OverrideError, SchoolTerms};
use crate::coords::{CoordError, GridProjection, ReferenceSystem};
use crate::gtfs::structs::RouteType;
use chrono::{Datelike, Local, NaiveDate};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    ReferenceSystem(#[from] CoordError),
    #[error("'{0}' is not a YYYYMMDD date")]
    InvalidDate(String),
    #[error("grid figures must be between 1 and 10, got {0}")]
    InvalidGridFigures(u8),
    #[error("impossible to read calendar file '{path}'")]
    CalendarFile {
        path: PathBuf,
        #[source]
        source: OverrideError,
    },
}

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Keep inbound journeys on their own `_inbd` route.
    pub directional_routes: bool,
    /// Grid the stop references are expressed in. `None` leaves stops at 0/0.
    pub reference_system: Option<ReferenceSystem>,
    /// Replaces blank journey start dates.
    pub first_date: NaiveDate,
    /// Replaces open journey end dates, and dates calendars that never run.
    pub final_date: NaiveDate,
    /// Fixed grid reference precision. `None` picks the best fit per stop.
    pub grid_figures: Option<u8>,
    pub mode: RouteType,
    pub timezone: String,
    /// Suffix every identifier with its source ordinal.
    pub unique_ids: bool,
    pub bank_holidays: BankHolidays,
    pub school_terms: SchoolTerms,
}

impl Config {
    pub fn new() -> Self {
        Config::starting(Local::now().date_naive())
    }

    /// Defaults for a run on `today`.
    pub fn starting(today: NaiveDate) -> Self {
        Config {
            directional_routes: false,
            reference_system: None,
            first_date: today,
            final_date: years_after(today, 1),
            grid_figures: None,
            mode: RouteType::Bus,
            timezone: "Europe/London".to_owned(),
            unique_ids: false,
            bank_holidays: BankHolidays::default(),
            school_terms: SchoolTerms::default(),
        }
    }

    /// Fails unless the code is a supported grid that PROJ can transform to WGS84.
    pub fn with_epsg(mut self, code: u32) -> Result<Self, ConfigError> {
        let system = ReferenceSystem::from_epsg(code)?;
        GridProjection::new(system)?;
        self.reference_system = Some(system);
        Ok(self)
    }

    /// Any GTFS route type code, basic or extended.
    pub fn with_mode(mut self, code: u16) -> Self {
        self.mode = RouteType::from(code);
        self
    }

    pub fn with_final_date(mut self, yyyymmdd: &str) -> Result<Self, ConfigError> {
        self.final_date = NaiveDate::parse_from_str(yyyymmdd, "%Y%m%d")
            .map_err(|_| ConfigError::InvalidDate(yyyymmdd.to_owned()))?;
        Ok(self)
    }

    pub fn with_grid_figures(mut self, figures: u8) -> Result<Self, ConfigError> {
        if !(1..=10).contains(&figures) {
            return Err(ConfigError::InvalidGridFigures(figures));
        }
        self.grid_figures = Some(figures);
        Ok(self)
    }

    pub fn with_bank_holiday_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        self.bank_holidays = BankHolidays::from_path(path).map_err(|source| ConfigError::CalendarFile {
            path: path.to_owned(),
            source,
        })?;
        Ok(self)
    }

    pub fn with_school_term_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        self.school_terms = SchoolTerms::from_path(path).map_err(|source| ConfigError::CalendarFile {
            path: path.to_owned(),
            source,
        })?;
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// Same calendar day `years` later; 29 February rolls to 1 March.
pub fn years_after(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
        .unwrap_or(date)
}
