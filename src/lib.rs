//! Conversion of ATCO-CIF bus timetables into GTFS feeds.

pub mod calendar;
pub mod cif;
pub mod config;
pub mod converter;
pub mod coords;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod gtfs;
pub mod ingest;
pub mod reconcile;
pub mod staging;

pub use config::Config;
pub use converter::{Converter, Report};
pub use error::Error;
pub use gtfs::Feed;
