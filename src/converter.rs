//! Entry point tying the conversion together: sources in, feed out.

use crate::config::Config;
use crate::diagnostics::{Diagnostics, LogDiagnostics, Notice};
use crate::export::Projector;
use crate::gtfs::Feed;
use crate::ingest::{ingest_source, SourceError, SourceSummary};
use crate::reconcile::{EntityKind, Reconciler, SourceScope};
use crate::staging::{MemoryStore, StagingError, StagingModel, Store};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead};

/// Converts any number of ATCO-CIF sources into one GTFS feed.
///
/// Sources are ingested one after the other with [`Converter::ingest`]; a
/// single [`Converter::finalize`] then builds the feed.
pub struct Converter<S: Store = MemoryStore, D: Diagnostics = LogDiagnostics> {
    config: Config,
    model: StagingModel<S>,
    diagnostics: D,
    sources: u32,
    rejected: Vec<String>,
    unsupported: BTreeMap<String, usize>,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        Converter::with_parts(config, MemoryStore::new(), LogDiagnostics)
    }
}

impl<S: Store, D: Diagnostics> Converter<S, D> {
    /// # Parameters
    /// - `store`: Where staged entities are kept, empty.
    /// - `diagnostics`: Receiver of every notice raised.
    pub fn with_parts(config: Config, store: S, diagnostics: D) -> Self {
        let reconciler = Reconciler::new(config.unique_ids, config.directional_routes);
        Converter {
            config,
            model: StagingModel::new(store, reconciler),
            diagnostics,
            sources: 0,
            rejected: Vec::new(),
            unsupported: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.model.store()
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> D {
        self.diagnostics
    }

    /// Ingest one source.
    ///
    /// # Parameters
    /// - `label`: Name of the source in notices and forced-unique identifiers.
    /// - `lines`: The source's lines, header first.
    ///
    /// # Returns
    /// The source summary, or why the whole source was skipped. Skipping a
    /// source is also reported as a notice and never affects other sources.
    pub fn ingest<I>(&mut self, label: &str, lines: I) -> Result<SourceSummary, SourceError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        self.sources += 1;
        let scope = SourceScope::new(label, self.sources);
        self.diagnostics
            .notify(Notice::Progress(format!("reading {}", label)));
        let result = ingest_source(
            &scope,
            &self.config,
            &mut self.model,
            &mut self.diagnostics,
            lines,
        );
        match &result {
            Ok(summary) => {
                for (code, count) in &summary.unsupported {
                    *self.unsupported.entry(code.clone()).or_insert(0) += count;
                }
            }
            Err(error) => {
                self.rejected.push(label.to_owned());
                self.diagnostics.notify(Notice::Rejected {
                    scope: label.to_owned(),
                    reason: error_chain(error),
                });
            }
        }
        result
    }

    /// Ingest a source from raw bytes. Lines need not be valid UTF-8.
    pub fn ingest_reader<R: BufRead>(
        &mut self,
        label: &str,
        reader: R,
    ) -> Result<SourceSummary, SourceError> {
        let lines = reader.split(b'\n').map(|line| {
            line.map(|bytes| {
                let text = String::from_utf8_lossy(&bytes);
                text.trim_end_matches('\r').to_owned()
            })
        });
        self.ingest(label, lines)
    }

    /// Record a source that could not be opened or unpacked. It counts as
    /// skipped in the report exactly like a source with a bad header.
    pub fn reject(&mut self, label: &str, error: &dyn std::error::Error) {
        self.rejected.push(label.to_owned());
        self.diagnostics.notify(Notice::Rejected {
            scope: label.to_owned(),
            reason: format!("{}: {}", label, error_chain(error)),
        });
    }

    /// Build the feed from everything ingested so far.
    pub fn finalize(&mut self) -> Result<Feed, StagingError> {
        let feed = Projector::new(&self.config).project(self.model.store(), &mut self.diagnostics)?;
        self.diagnostics.notify(Notice::Progress(format!(
            "converted {} sources into {} trips",
            self.sources,
            feed.trips.len()
        )));
        Ok(feed)
    }

    /// Quality summary of a finalized feed.
    pub fn report(&self, feed: &Feed) -> Report {
        let zero_coordinate_stops = feed
            .stops
            .iter()
            .filter(|s| s.stop_lat == 0.0 && s.stop_lon == 0.0)
            .map(|s| s.stop_id.clone())
            .collect();
        Report {
            sources: self.sources as usize,
            rejected: self.rejected.clone(),
            agencies: feed.agencies.len(),
            stops: feed.stops.len(),
            routes: feed.routes.len(),
            trips: feed.trips.len(),
            stop_times: feed.stop_times.len(),
            calendars: feed.calendar.len(),
            calendar_dates: feed.calendar_dates.len(),
            zero_coordinate_stops,
            shared_routes: self.model.reconciler().shared(EntityKind::Route),
            unsupported: self.unsupported.clone(),
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Totals and quality findings of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    pub sources: usize,
    pub rejected: Vec<String>,
    pub agencies: usize,
    pub stops: usize,
    pub routes: usize,
    pub trips: usize,
    pub stop_times: usize,
    pub calendars: usize,
    pub calendar_dates: usize,
    /// Stops exported at 0/0.
    pub zero_coordinate_stops: Vec<String>,
    /// Routes defined by more than one source, merged into one.
    pub shared_routes: Vec<String>,
    pub unsupported: BTreeMap<String, usize>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sources: {} read, {} skipped", self.sources, self.rejected.len())?;
        for label in &self.rejected {
            writeln!(f, "  skipped {}", label)?;
        }
        writeln!(f, "Totals:")?;
        writeln!(f, "  Agencies: {}", self.agencies)?;
        writeln!(f, "  Stops: {}", self.stops)?;
        writeln!(f, "  Routes: {}", self.routes)?;
        writeln!(f, "  Trips: {}", self.trips)?;
        writeln!(f, "  Stop times: {}", self.stop_times)?;
        writeln!(f, "  Calendars: {}", self.calendars)?;
        writeln!(f, "  Calendar dates: {}", self.calendar_dates)?;
        if !self.zero_coordinate_stops.is_empty() {
            writeln!(
                f,
                "Stops at 0/0: {} ({})",
                self.zero_coordinate_stops.len(),
                self.zero_coordinate_stops.join(", ")
            )?;
        }
        if !self.shared_routes.is_empty() {
            writeln!(
                f,
                "Routes merged across sources: {}",
                self.shared_routes.join(", ")
            )?;
        }
        for (code, count) in &self.unsupported {
            writeln!(
                f,
                "Unsupported {} records: {} ({})",
                code,
                count,
                crate::cif::records::unsupported_reason(code)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::staging::SqliteStore;
    use chrono::NaiveDate;
    use std::io::Cursor;

    const HEADER: &str = "ATCO-CIF0500Electronic Registration         MIA 4.20.18     20200113104034";

    fn config() -> Config {
        Config::starting(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    }

    fn source(operator_name: &str) -> String {
        [
            HEADER,
            &format!("QPNOP  {:<24}Operator Ltd        ", operator_name),
            "QDNOP  101 OCity - Town",
            "QSNOP  42    20200101202001121010100  101 101-42BIGBUS  TC=10142O",
            "QNA      Via Aplace  ",
            "QOSTOP-REF00032215A  T1F1",
            "QTSTOP-REF00070025A  T1F0",
            "QLNSTOP-REF0003The Stop",
            "QBNSTOP-REF0003333448  373764",
            "QCNSTOP",
        ]
        .join("\r\n")
    }

    fn converter(config: Config) -> Converter<MemoryStore, CollectingDiagnostics> {
        Converter::with_parts(config, MemoryStore::new(), CollectingDiagnostics::new())
    }

    #[test]
    fn end_to_end() {
        let mut converter = converter(config().with_epsg(29903).unwrap());
        let summary = converter
            .ingest_reader("a.cif", Cursor::new(source("Operator One")))
            .unwrap();
        assert_eq!(summary.journeys, 1);
        let feed = converter.finalize().unwrap();
        feed.check_references().unwrap();

        assert_eq!(feed.agencies[0].agency_name, "Operator One");
        assert_eq!(feed.routes[0].route_long_name.as_deref(), Some("City - Town"));
        assert_eq!(feed.trips[0].trip_headsign.as_deref(), Some("Via Aplace"));
        assert_eq!(feed.stop_times[1].arrival_time, "24:25:00");
        assert_eq!(feed.stops[0].stop_name, "The Stop");
        assert!((feed.stops[0].stop_lat - 54.59449625).abs() < 1e-4);
        assert_eq!(feed.calendar[0].start_date, "20200101");
        assert_eq!(feed.calendar[0].end_date, "20200110");

        let report = converter.report(&feed);
        assert_eq!(report.trips, 1);
        assert_eq!(report.zero_coordinate_stops, vec!["STOP-REF0007".to_string()]);
        assert_eq!(report.unsupported.get("QC"), Some(&1));
        assert!(report.to_string().contains("Unsupported QC records: 1"));
    }

    #[test]
    fn identical_sources_merge() {
        let mut converter = converter(config());
        converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        converter.ingest_reader("b.cif", Cursor::new(source("Operator One"))).unwrap();
        let feed = converter.finalize().unwrap();
        assert_eq!(feed.agencies.len(), 1);
        assert_eq!(feed.routes.len(), 1);
        assert_eq!(feed.stops.len(), 2);
        assert_eq!(feed.trips.len(), 2);
        assert_eq!(feed.calendar.len(), 1);
        assert_eq!(converter.report(&feed).shared_routes, vec!["OP_101".to_string()]);
        assert!(!converter
            .diagnostics()
            .notices
            .iter()
            .any(|n| matches!(n, Notice::Consistency(_))));
    }

    #[test]
    fn conflicting_sources_warn_and_keep_the_first() {
        let mut converter = converter(config());
        converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        converter.ingest_reader("b.cif", Cursor::new(source("Operator Two"))).unwrap();
        let feed = converter.finalize().unwrap();
        assert_eq!(feed.agencies.len(), 1);
        assert_eq!(feed.agencies[0].agency_name, "Operator One");
        assert!(converter
            .diagnostics()
            .notices
            .iter()
            .any(|n| matches!(n, Notice::Consistency(w) if w.scope == "b.cif")));
    }

    #[test]
    fn forced_unique_identifiers() {
        let mut config = config();
        config.unique_ids = true;
        let mut converter = converter(config);
        converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        converter.ingest_reader("b.cif", Cursor::new(source("Operator One"))).unwrap();
        let feed = converter.finalize().unwrap();
        feed.check_references().unwrap();
        let agencies: Vec<_> = feed.agencies.iter().map(|a| a.agency_id.as_str()).collect();
        assert_eq!(agencies, vec!["OP_0001", "OP_0002"]);
        let routes: Vec<_> = feed.routes.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(routes, vec!["OP_101_0001", "OP_101_0002"]);
        assert_eq!(feed.stops.len(), 4);
        assert!(converter.report(&feed).shared_routes.is_empty());
    }

    #[test]
    fn rejected_source_does_not_stop_the_run() {
        let mut converter = converter(config());
        assert!(converter
            .ingest_reader("rail.cif", Cursor::new("HDTPS.UCFCATE.PD2001\n"))
            .is_err());
        converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        let feed = converter.finalize().unwrap();
        assert_eq!(feed.trips.len(), 1);
        let report = converter.report(&feed);
        assert_eq!(report.rejected, vec!["rail.cif".to_string()]);
        assert!(converter
            .diagnostics()
            .notices
            .iter()
            .any(|n| matches!(n, Notice::Rejected { scope, .. } if scope == "rail.cif")));
    }

    #[test]
    fn unreadable_source_is_reported_as_skipped() {
        let mut converter = converter(config());
        let error = io::Error::new(io::ErrorKind::InvalidData, "not a zip archive");
        converter.reject("broken.zip", &error);
        converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        let feed = converter.finalize().unwrap();
        assert_eq!(feed.trips.len(), 1);
        assert_eq!(converter.report(&feed).rejected, vec!["broken.zip".to_string()]);
        assert!(converter.diagnostics().notices.iter().any(|n| matches!(
            n,
            Notice::Rejected { scope, reason } if scope == "broken.zip" && reason.ends_with("not a zip archive")
        )));
    }

    #[test]
    fn decoding_is_idempotent() {
        let run = || {
            let mut converter = converter(config());
            converter.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
            converter.finalize().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn sqlite_staging_gives_the_same_feed() {
        let mut in_memory = converter(config());
        in_memory.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        in_memory.ingest_reader("b.cif", Cursor::new(source("Operator Two"))).unwrap();

        let mut sqlite = Converter::with_parts(
            config(),
            SqliteStore::open_in_memory().unwrap(),
            CollectingDiagnostics::new(),
        );
        sqlite.ingest_reader("a.cif", Cursor::new(source("Operator One"))).unwrap();
        sqlite.ingest_reader("b.cif", Cursor::new(source("Operator Two"))).unwrap();

        assert_eq!(in_memory.finalize().unwrap(), sqlite.finalize().unwrap());
        assert_eq!(in_memory.diagnostics().notices, sqlite.diagnostics().notices);
    }
}
