use crate::gtfs::error::Error;
use crate::gtfs::structs::*;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// GTFS dataset produced by a conversion run.
/// https://gtfs.org/documentation/schedule/reference/#dataset-files
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Feed {
    pub agencies: Vec<Agency>,
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub calendar: Vec<Calendar>,
    pub calendar_dates: Vec<CalendarDate>,
}

impl Feed {
    /// Row counts per table, at info level.
    pub fn log_stats(&self) {
        log::info!("GTFS data:");
        log::info!("  Agencies: {} objects", self.agencies.len());
        log::info!("  Stops: {} objects", self.stops.len());
        log::info!("  Routes: {} objects", self.routes.len());
        log::info!("  Trips: {} objects", self.trips.len());
        log::info!("  Stop times: {} objects", self.stop_times.len());
        log::info!("  Calendar: {} objects", self.calendar.len());
        log::info!("  Calendar Dates: {} objects", self.calendar_dates.len());
    }

    /// Checks that ids are unique per file and that every reference resolves.
    pub fn check_references(&self) -> Result<(), Error> {
        let agencies = unique_ids(&self.agencies, Agency::FILE_NAME)?;
        let stops = unique_ids(&self.stops, Stop::FILE_NAME)?;
        let routes = unique_ids(&self.routes, Route::FILE_NAME)?;
        let trips = unique_ids(&self.trips, Trip::FILE_NAME)?;
        let services = unique_ids(&self.calendar, Calendar::FILE_NAME)?;

        let known = |ids: &HashSet<&str>, id: &str| {
            if ids.contains(id) {
                Ok(())
            } else {
                Err(Error::ReferenceError(id.to_owned()))
            }
        };
        for route in &self.routes {
            known(&agencies, &route.agency_id)?;
        }
        for trip in &self.trips {
            known(&routes, &trip.route_id)?;
            known(&services, &trip.service_id)?;
        }
        for stop_time in &self.stop_times {
            known(&trips, &stop_time.trip_id)?;
            known(&stops, &stop_time.stop_id)?;
        }
        for date in &self.calendar_dates {
            known(&services, &date.service_id)?;
        }
        Ok(())
    }

    /// Write every table into a zip archive, each as `<table>.txt`.
    ///
    /// # Returns
    /// The underlying writer once the archive is finished.
    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> Result<W, Error> {
        let mut zip = ZipWriter::new(writer);
        write_table(&mut zip, &self.agencies)?;
        write_table(&mut zip, &self.stops)?;
        write_table(&mut zip, &self.routes)?;
        write_table(&mut zip, &self.trips)?;
        write_table(&mut zip, &self.stop_times)?;
        write_table(&mut zip, &self.calendar)?;
        write_table(&mut zip, &self.calendar_dates)?;
        Ok(zip.finish()?)
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = self.write_zip(BufWriter::new(file))?;
        writer.flush()?;
        Ok(())
    }
}

fn unique_ids<'a, T: Id + Table>(rows: &'a [T], file_name: &'static str) -> Result<HashSet<&'a str>, Error> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        if !ids.insert(row.id()) {
            return Err(Error::DuplicateId {
                file_name,
                id: row.id().to_owned(),
            });
        }
    }
    Ok(ids)
}

fn write_table<W: Write + Seek, T: Table>(zip: &mut ZipWriter<W>, rows: &[T]) -> Result<(), Error> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(T::FILE_NAME, options)?;

    let csv_error = |source| Error::CSVError {
        file_name: T::FILE_NAME,
        source,
    };
    // Headers are written by hand so that empty tables still carry them.
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut *zip);
    wtr.write_record(T::HEADERS).map_err(csv_error)?;
    for row in rows {
        wtr.serialize(row).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}
