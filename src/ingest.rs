//! Reading one source into the staging model.
//!
//! Journeys are assembled record by record. Operators, stops and route
//! descriptions are buffered for the whole source since location records
//! usually trail the journeys that use them, then everything is staged
//! parents first once the source is exhausted.

use crate::calendar::OperatingPattern;
use crate::cif::records::{unsupported_reason, Call, DateRunning, JourneyHeader, Repetition};
use crate::cif::{decode, Direction, Header, HeaderError, LineError, Record, Transaction};
use crate::config::Config;
use crate::coords::GridRef;
use crate::diagnostics::{Diagnostics, Notice};
use crate::reconcile::SourceScope;
use crate::staging::{
    CallDraft, JourneyDraft, RouteKey, ServiceTime, Staged, StagingError, StagingModel, Store,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A source that was skipped as a whole.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{scope}: unrecognised header")]
    Header {
        scope: String,
        #[source]
        source: HeaderError,
    },
    #[error("{scope}: impossible to read")]
    Read {
        scope: String,
        #[source]
        source: io::Error,
    },
    #[error("{scope}: impossible to stage")]
    Staging {
        scope: String,
        #[source]
        source: StagingError,
    },
}

/// What one source contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub lines: usize,
    pub journeys: usize,
    pub malformed: usize,
    /// Unsupported record codes and how often they occurred.
    pub unsupported: BTreeMap<String, usize>,
}

/// Attributes gathered for one identifier, later lines filling or replacing
/// earlier blanks.
#[derive(Debug, Default, Clone)]
struct OperatorDetails {
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct StopDetails {
    name: Option<String>,
    grid: Option<GridRef>,
}

#[derive(Debug, Default, Clone)]
struct RouteDetails {
    outbound: Option<String>,
    inbound: Option<String>,
}

/// A journey still receiving records.
#[derive(Debug, Clone)]
struct PendingJourney {
    line: usize,
    draft: JourneyDraft,
    calls: Vec<(usize, CallDraft)>,
    /// Whole days added to clock times so far.
    day_offset: u32,
    last: Option<ServiceTime>,
    repetitions: Vec<PendingJourney>,
}

impl PendingJourney {
    fn new(line: usize, draft: JourneyDraft) -> Self {
        PendingJourney {
            line,
            draft,
            calls: Vec::new(),
            day_offset: 0,
            last: None,
            repetitions: Vec::new(),
        }
    }

    /// Places a clock time on the service day, rolling over midnight when it
    /// runs backwards.
    fn service_time(&mut self, minutes: u32) -> ServiceTime {
        let mut time = minutes + self.day_offset * MINUTES_PER_DAY;
        if let Some(last) = self.last {
            if time < last.minutes() {
                self.day_offset += 1;
                time += MINUTES_PER_DAY;
            }
        }
        self.last = Some(ServiceTime(time));
        ServiceTime(time)
    }

    fn push_call(&mut self, line: usize, call: &Call) {
        let arrival = self.service_time(call.arrival.minutes());
        let departure = self.service_time(call.departure.minutes());
        self.calls.push((
            line,
            CallDraft {
                location: call.location.clone(),
                arrival,
                departure,
                pickup_allowed: call.activity.pickup_allowed(),
                set_down_allowed: call.activity.set_down_allowed(),
                timepoint: call.timing_point,
            },
        ));
    }

    fn add_note(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() || !self.calls.is_empty() {
            return;
        }
        self.draft.headsign = Some(match self.draft.headsign.take() {
            Some(previous) => format!("{} | {}", previous, text),
            None => text.to_owned(),
        });
    }

    /// Copy of the template shifted to start at the repetition's departure.
    /// `None` when the template has no stop times yet.
    fn repeat(&self, line: usize, repetition: &Repetition) -> Option<PendingJourney> {
        let first = self.calls.first()?.1.departure.minutes();
        let departure = repetition.departure.minutes();
        let offset = if departure >= first {
            departure - first
        } else {
            departure + MINUTES_PER_DAY - first
        };
        let mut draft = self.draft.clone();
        if !repetition.journey_code.is_empty() {
            draft.journey_code = repetition.journey_code.clone();
        }
        draft.running_board = repetition.running_board.clone();
        let calls = self
            .calls
            .iter()
            .map(|(_, call)| {
                let mut call = call.clone();
                call.arrival = call.arrival.offset(offset);
                call.departure = call.departure.offset(offset);
                (line, call)
            })
            .collect();
        Some(PendingJourney {
            line,
            draft,
            calls,
            day_offset: 0,
            last: None,
            repetitions: Vec::new(),
        })
    }
}

/// Everything read from one source, waiting to be staged.
#[derive(Debug, Default)]
struct SourceBatch {
    operators: HashMap<String, OperatorDetails>,
    stops: HashMap<String, StopDetails>,
    routes: HashMap<(String, String), RouteDetails>,
    journeys: Vec<PendingJourney>,
}

impl SourceBatch {
    fn operator(&mut self, code: &str) -> &mut OperatorDetails {
        self.operators.entry(code.to_owned()).or_default()
    }

    fn stop(&mut self, location: &str) -> &mut StopDetails {
        self.stops.entry(location.to_owned()).or_default()
    }

    fn route(&mut self, operator: &str, number: &str) -> &mut RouteDetails {
        self.routes
            .entry((operator.to_owned(), number.to_owned()))
            .or_default()
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Line-by-line reader for one source.
pub struct SourceReader<'a, D: Diagnostics> {
    scope: &'a SourceScope,
    config: &'a Config,
    diagnostics: D,
    batch: SourceBatch,
    journey: Option<PendingJourney>,
    /// Inside a journey block that was deleted or could not be read.
    skipping: bool,
    summary: SourceSummary,
}

impl<'a, D: Diagnostics> SourceReader<'a, D> {
    pub fn new(scope: &'a SourceScope, config: &'a Config, diagnostics: D) -> Self {
        SourceReader {
            scope,
            config,
            diagnostics,
            batch: SourceBatch::default(),
            journey: None,
            skipping: false,
            summary: SourceSummary::default(),
        }
    }

    /// Handle one body line. `number` is the 1-based line number in the source.
    pub fn line(&mut self, number: usize, line: &str) {
        self.summary.lines = number;
        match decode(line) {
            Ok(record) => self.record(number, record),
            Err(error) => {
                let code: String = line.chars().take(2).collect();
                if code == "QS" {
                    // Records up to the next header belong to an unreadable journey.
                    self.close_journey();
                    self.skipping = true;
                }
                self.summary.malformed += 1;
                self.diagnostics.notify(Notice::Malformed(LineError {
                    scope: self.scope.label.clone(),
                    line: number,
                    error,
                }));
            }
        }
    }

    fn record(&mut self, number: usize, record: Record) {
        if self.diagnostics.verbose() {
            if let Some(code) = accepted_code(&record) {
                self.notify_line(number, code, |scope, line, code| Notice::Accepted {
                    scope,
                    line,
                    code,
                });
            }
        }
        match record {
            Record::JourneyHeader(header) => self.journey_header(number, header),
            Record::DateRunning(date_running) => self.date_running(number, &date_running),
            Record::Note(note) => {
                if let Some(journey) = self.open_journey(number, "QN") {
                    journey.add_note(&note.text);
                }
            }
            Record::Call(call) => {
                if let Some(journey) = self.open_journey(number, call_code(&call)) {
                    journey.push_call(number, &call);
                }
            }
            Record::Repetition(repetition) => self.repetition(number, &repetition),
            Record::Location(location) => {
                if self.deleted(number, "QL", location.transaction) {
                    return;
                }
                fill(&mut self.batch.stop(&location.location).name, &location.name);
            }
            Record::LocationGrid(grid) => {
                if self.deleted(number, "QB", grid.transaction) {
                    return;
                }
                if !grid.easting.is_empty() && !grid.northing.is_empty() {
                    self.batch.stop(&grid.location).grid = Some(GridRef::new(&grid.easting, &grid.northing));
                }
            }
            Record::Operator(operator) => {
                if self.deleted(number, "QP", operator.transaction) {
                    return;
                }
                let details = self.batch.operator(&operator.code);
                fill(&mut details.name, &operator.name.or(operator.legal_name));
                fill(&mut details.phone, &operator.phone);
            }
            Record::RouteDescription(description) => {
                if self.deleted(number, "QD", description.transaction) {
                    return;
                }
                let details = self
                    .batch
                    .route(&description.operator, &description.route_number);
                match description.direction {
                    Direction::Outbound => fill(&mut details.outbound, &description.description),
                    Direction::Inbound => fill(&mut details.inbound, &description.description),
                }
            }
            Record::Ignored(_) => {}
            Record::Unsupported(code) => {
                *self.summary.unsupported.entry(code.clone()).or_insert(0) += 1;
                let reason = unsupported_reason(&code);
                self.diagnostics.notify(Notice::Unsupported {
                    scope: self.scope.label.clone(),
                    line: number,
                    code,
                    reason,
                });
            }
        }
    }

    fn journey_header(&mut self, number: usize, header: JourneyHeader) {
        self.close_journey();
        if self.deleted(number, "QS", header.transaction) {
            self.skipping = true;
            return;
        }
        self.skipping = false;

        let mut pattern = OperatingPattern::new(
            header.weekdays,
            header.start.or(self.config.first_date),
            header.end.or(self.config.final_date),
        );
        pattern.school = header.school;
        pattern.bank_holidays = header.bank_holidays;

        let draft = JourneyDraft {
            route: RouteKey {
                operator: header.operator,
                number: header.route_number,
                direction: header.direction,
                line: number,
            },
            journey_code: header.journey_code,
            running_board: header.running_board,
            vehicle_type: header.vehicle_type,
            headsign: None,
            pattern,
        };
        self.journey = Some(PendingJourney::new(number, draft));
    }

    fn date_running(&mut self, number: usize, date_running: &DateRunning) {
        let first = self.config.first_date;
        let last = self.config.final_date;
        if let Some(journey) = self.open_journey(number, "QE") {
            journey.draft.pattern.add_exception_range(
                date_running.start.or(first),
                date_running.end.or(last),
                date_running.kind,
            );
        }
    }

    fn repetition(&mut self, number: usize, repetition: &Repetition) {
        let Some(journey) = self.open_journey(number, "QR") else {
            return;
        };
        match journey.repeat(number, repetition) {
            Some(copy) => journey.repetitions.push(copy),
            None => self.notify_line(number, "QR", |scope, line, code| Notice::Detached {
                scope,
                line,
                code,
            }),
        }
    }

    /// The journey that journey-level records attach to. Reports records
    /// outside of any journey, except inside a skipped block.
    fn open_journey(&mut self, number: usize, code: &str) -> Option<&mut PendingJourney> {
        if self.journey.is_none() && !self.skipping {
            self.notify_line(number, code, |scope, line, code| Notice::Detached {
                scope,
                line,
                code,
            });
        }
        self.journey.as_mut()
    }

    fn deleted(&mut self, number: usize, code: &str, transaction: Transaction) -> bool {
        if transaction != Transaction::Delete {
            return false;
        }
        self.notify_line(number, code, |scope, line, code| Notice::Deleted {
            scope,
            line,
            code,
        });
        true
    }

    fn notify_line<F>(&mut self, number: usize, code: &str, notice: F)
    where
        F: FnOnce(String, usize, String) -> Notice,
    {
        self.diagnostics
            .notify(notice(self.scope.label.clone(), number, code.to_owned()));
    }

    fn close_journey(&mut self) {
        if let Some(mut journey) = self.journey.take() {
            let repetitions = std::mem::take(&mut journey.repetitions);
            self.batch.journeys.push(journey);
            self.batch.journeys.extend(repetitions);
        }
    }

    /// Stage everything read, parents first.
    ///
    /// Only operators, stops and routes used by a journey are staged.
    /// Records dropped for referential reasons are reported; any other
    /// storage failure aborts the source.
    pub fn finish<S: Store>(
        mut self,
        model: &mut StagingModel<S>,
    ) -> Result<SourceSummary, StagingError> {
        self.close_journey();
        let batch = std::mem::take(&mut self.batch);
        let directional = model.reconciler().directional_routes();

        let mut operators = Vec::new();
        let mut stops = Vec::new();
        let mut routes: Vec<&RouteKey> = Vec::new();
        let mut seen_routes = HashSet::new();
        {
            let mut seen_operators = HashSet::new();
            let mut seen_stops = HashSet::new();
            for journey in &batch.journeys {
                let key = &journey.draft.route;
                if seen_operators.insert(key.operator.as_str()) {
                    operators.push(key.operator.as_str());
                }
                let route_id = model.reconciler().route_id(
                    &key.operator,
                    &key.number,
                    key.direction,
                    self.scope,
                    key.line,
                );
                if seen_routes.insert(route_id) {
                    routes.push(key);
                }
                for (_, call) in &journey.calls {
                    if seen_stops.insert(call.location.as_str()) {
                        stops.push(call.location.as_str());
                    }
                }
            }
        }

        for code in operators {
            let details = batch.operators.get(code).cloned().unwrap_or_default();
            let staged = model.put_operator(self.scope, code, details.name, details.phone)?;
            self.consistency(staged);
        }
        for location in stops {
            let details = batch.stops.get(location).cloned().unwrap_or_default();
            let staged = model.put_stop(self.scope, location, details.name, details.grid)?;
            self.consistency(staged);
        }
        for key in routes {
            let details = batch
                .routes
                .get(&(key.operator.clone(), key.number.clone()))
                .cloned()
                .unwrap_or_default();
            let (outbound, inbound) = match (directional, key.direction) {
                (false, _) => (details.outbound, details.inbound),
                (true, Direction::Outbound) => (details.outbound, None),
                (true, Direction::Inbound) => (None, details.inbound),
            };
            match model.put_route(self.scope, key, outbound, inbound) {
                Ok(staged) => self.consistency(staged),
                Err(StagingError::Referential(error)) => self.referential(key.line, error),
                Err(other) => return Err(other),
            }
        }

        for journey in batch.journeys {
            let id = match model.put_journey(self.scope, journey.draft) {
                Ok(id) => id,
                Err(StagingError::Referential(error)) => {
                    self.referential(journey.line, error);
                    continue;
                }
                Err(other) => return Err(other),
            };
            self.summary.journeys += 1;
            for (sequence, (line, call)) in (1..).zip(&journey.calls) {
                match model.append_stop_time(self.scope, id, sequence, call) {
                    Ok(()) => {}
                    Err(StagingError::Referential(error)) => self.referential(*line, error),
                    Err(other) => return Err(other),
                }
            }
        }

        log::debug!(
            "{}: {} lines, {} journeys staged",
            self.scope,
            self.summary.lines,
            self.summary.journeys
        );
        Ok(self.summary)
    }

    fn consistency(&mut self, staged: Staged) {
        if let Some(warning) = staged.warning {
            self.diagnostics.notify(Notice::Consistency(warning));
        }
    }

    fn referential(&mut self, line: usize, error: crate::staging::ReferentialError) {
        self.diagnostics.notify(Notice::Referential {
            scope: self.scope.label.clone(),
            line,
            error,
        });
    }
}

fn call_code(call: &Call) -> &'static str {
    match call.kind {
        crate::cif::records::CallKind::Origin => "QO",
        crate::cif::records::CallKind::Intermediate => "QI",
        crate::cif::records::CallKind::Destination => "QT",
    }
}

fn accepted_code(record: &Record) -> Option<&'static str> {
    match record {
        Record::JourneyHeader(_) => Some("QS"),
        Record::DateRunning(_) => Some("QE"),
        Record::Note(_) => Some("QN"),
        Record::Call(call) => Some(call_code(call)),
        Record::Repetition(_) => Some("QR"),
        Record::Location(_) => Some("QL"),
        Record::LocationGrid(_) => Some("QB"),
        Record::Operator(_) => Some("QP"),
        Record::RouteDescription(_) => Some("QD"),
        Record::Ignored(_) | Record::Unsupported(_) => None,
    }
}

/// Read a whole source: the header line, then every body line, then stage.
///
/// # Parameters
/// - `lines`: the source's lines, without their terminators.
///
/// # Returns
/// What the source contributed, or why it was skipped. A skipped source
/// leaves the staging model untouched.
pub fn ingest_source<S, D, I>(
    scope: &SourceScope,
    config: &Config,
    model: &mut StagingModel<S>,
    diagnostics: D,
    lines: I,
) -> Result<SourceSummary, SourceError>
where
    S: Store,
    D: Diagnostics,
    I: IntoIterator<Item = io::Result<String>>,
{
    let read_error = |source| SourceError::Read {
        scope: scope.label.clone(),
        source,
    };
    let mut lines = lines.into_iter();
    let first = lines.next().transpose().map_err(read_error)?;
    Header::decode(first.as_deref().unwrap_or_default()).map_err(|source| SourceError::Header {
        scope: scope.label.clone(),
        source,
    })?;

    let mut reader = SourceReader::new(scope, config, diagnostics);
    for (number, line) in (2..).zip(lines) {
        let line = line.map_err(read_error)?;
        reader.line(number, &line);
    }
    reader.finish(model).map_err(|source| SourceError::Staging {
        scope: scope.label.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ExceptionKind;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::reconcile::Reconciler;
    use crate::staging::{JourneyId, MemoryStore};
    use chrono::NaiveDate;

    const HEADER: &str = "ATCO-CIF0500Electronic Registration         MIA 4.20.18     20200113104034";
    const QS: &str = "QSNOP  42    20200101202001121010100  101 101-42BIGBUS  TC=10142I";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> Config {
        Config::starting(date(2020, 1, 1))
    }

    fn run(
        lines: &[&str],
        config: &Config,
    ) -> (Result<SourceSummary, SourceError>, MemoryStore, CollectingDiagnostics) {
        let scope = SourceScope::new("test.cif", 1);
        let mut model = StagingModel::new(MemoryStore::new(), Reconciler::new(false, config.directional_routes));
        let mut diagnostics = CollectingDiagnostics::new();
        let result = ingest_source(
            &scope,
            config,
            &mut model,
            &mut diagnostics,
            lines.iter().map(|l| Ok(l.to_string())),
        );
        (result, model.into_store(), diagnostics)
    }

    fn times(store: &MemoryStore, journey: u32) -> Vec<(String, String, String, bool, bool, bool)> {
        store
            .stop_times(JourneyId(journey))
            .unwrap()
            .into_iter()
            .map(|t| {
                (
                    t.arrival.to_string(),
                    t.departure.to_string(),
                    t.stop_id,
                    t.pickup_allowed,
                    t.set_down_allowed,
                    t.timepoint,
                )
            })
            .collect()
    }

    #[test]
    fn stop_times_roll_past_midnight() {
        let (result, store, _) = run(
            &[
                HEADER,
                QS,
                "QOSTOP-REF00032215A  T1F1",
                "QISTOP-REF000422552300B   T0F0",
                "QISTOP-REF000523402341P   T0F0",
                "QISTOP-REF000623502350S   T1F0",
                "QTSTOP-REF00070025A  T1F0",
            ],
            &config(),
        );
        assert_eq!(result.unwrap().journeys, 1);
        let s = |a: &str, d: &str, stop: &str, p, sd, t| (a.to_string(), d.to_string(), stop.to_string(), p, sd, t);
        assert_eq!(
            times(&store, 1),
            vec![
                s("22:15:00", "22:15:00", "STOP-REF0003", true, false, true),
                s("22:55:00", "23:00:00", "STOP-REF0004", true, true, false),
                s("23:40:00", "23:41:00", "STOP-REF0005", true, false, false),
                s("23:50:00", "23:50:00", "STOP-REF0006", false, true, true),
                s("24:25:00", "24:25:00", "STOP-REF0007", false, true, true),
            ]
        );
    }

    #[test]
    fn repetition_copies_the_journey() {
        let (result, store, _) = run(
            &[
                HEADER,
                QS,
                "QOSTOP-REF00082315A  T1F1",
                "QTSTOP-REF00092355A  T1F0",
                "QRSTOP-REF0008234543    101-43BIGBUS  ",
            ],
            &config(),
        );
        assert_eq!(result.unwrap().journeys, 2);
        let journeys = store.journeys().unwrap();
        assert_eq!(journeys[1].running_board.as_deref(), Some("101-43"));
        assert_eq!(journeys[1].journey_code, "43");
        assert_eq!(journeys[1].route_id, journeys[0].route_id);
        assert_eq!(journeys[1].pattern, journeys[0].pattern);
        let arrivals: Vec<_> = times(&store, 2).into_iter().map(|t| t.0).collect();
        assert_eq!(arrivals, vec!["23:45:00", "24:25:00"]);
    }

    #[test]
    fn notes_become_headsign() {
        let (_, store, _) = run(
            &[
                HEADER,
                QS,
                "QNA      Via Aplace  ",
                "ZNB      Not Sundays",
                "QOSTOP-REF00082315A  T1F1",
                "QNC      Stop note",
                "QTSTOP-REF00092355A  T1F0",
            ],
            &config(),
        );
        let journeys = store.journeys().unwrap();
        assert_eq!(journeys[0].headsign.as_deref(), Some("Via Aplace | Not Sundays"));
    }

    #[test]
    fn date_running_exceptions() {
        let (_, store, _) = run(
            &[
                HEADER,
                QS,
                "QE20200101202001030",
                "QE20200201202002011",
                "QOSTOP-REF00082315A  T1F1",
            ],
            &config(),
        );
        let journey = &store.journeys().unwrap()[0];
        let exceptions: Vec<_> = journey.pattern.exceptions().collect();
        assert_eq!(
            exceptions,
            vec![
                (date(2020, 1, 1), ExceptionKind::Remove),
                (date(2020, 1, 2), ExceptionKind::Remove),
                (date(2020, 1, 3), ExceptionKind::Remove),
                (date(2020, 2, 1), ExceptionKind::Add),
            ]
        );
    }

    #[test]
    fn parents_are_staged_with_placeholders() {
        let (_, store, _) = run(
            &[
                HEADER,
                "QPNOP  Operator One            Operator One Ltd    ",
                "QDNOP  101 OCity - Town",
                "QDNOP  101 ITown - City",
                QS,
                "QOSTOP-REF00082315A  T1F1",
                "QTSTOP-REF00092355A  T1F0",
                "QLNSTOP-REF0008The Stop",
                "QBNSTOP-REF0008333448  373764",
                "QLNSTOP-REF0099Never Used",
            ],
            &config(),
        );
        let operators = store.operators().unwrap();
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].name.as_deref(), Some("Operator One"));

        let stops = store.stops().unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].name.as_deref(), Some("The Stop"));
        assert_eq!(stops[0].grid, Some(GridRef::new("333448", "373764")));
        assert_eq!(stops[1].id, "STOP-REF0009");
        assert_eq!(stops[1].name, None);

        let routes = store.routes().unwrap();
        assert_eq!(routes[0].id, "OP_101");
        assert_eq!(routes[0].long_name().as_deref(), Some("City - Town | Town - City"));
    }

    #[test]
    fn directional_routes_split_descriptions() {
        let mut config = config();
        config.directional_routes = true;
        let (_, store, _) = run(
            &[
                HEADER,
                "QDNOP  101 OCity - Town",
                "QDNOP  101 ITown - City",
                QS,
                "QOSTOP-REF00082315A  T1F1",
            ],
            &config,
        );
        let routes = store.routes().unwrap();
        assert_eq!(routes[0].id, "OP_101_inbd");
        assert_eq!(routes[0].long_name().as_deref(), Some("Town - City"));
    }

    #[test]
    fn deleted_and_malformed_blocks_are_skipped() {
        let deleted_qs = QS.replacen("QSN", "QSD", 1);
        let (result, store, diagnostics) = run(
            &[
                HEADER,
                &deleted_qs,
                "QOSTOP-REF00082315A  T1F1",
                "QSNOP  43    2020010120200112",
                "QOSTOP-REF00082315A  T1F1",
                "QLDSTOP-REF0008Gone",
                QS,
                "QOSTOP-REF00082315A  T1F1",
                "QTSTOP-REF000",
                "QTSTOP-REF00092355A  T1F0",
            ],
            &config(),
        );
        let summary = result.unwrap();
        assert_eq!(summary.journeys, 1);
        assert_eq!(summary.malformed, 2);
        assert_eq!(store.stop_times(JourneyId(1)).unwrap().len(), 2);
        assert_eq!(store.stop("STOP-REF0008").unwrap().unwrap().name, None);

        let deleted = diagnostics
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::Deleted { .. }))
            .count();
        assert_eq!(deleted, 2);
        assert!(!diagnostics
            .notices
            .iter()
            .any(|n| matches!(n, Notice::Detached { .. })));
    }

    #[test]
    fn records_outside_a_journey() {
        let (_, _, diagnostics) = run(&[HEADER, "QOSTOP-REF00082315A  T1F1", "QE20200101202001030"], &config());
        let detached: Vec<_> = diagnostics
            .notices
            .iter()
            .filter_map(|n| match n {
                Notice::Detached { code, line, .. } => Some((code.as_str(), *line)),
                _ => None,
            })
            .collect();
        assert_eq!(detached, vec![("QO", 2), ("QE", 3)]);
    }

    #[test]
    fn unsupported_records_are_counted() {
        let (result, _, diagnostics) = run(&[HEADER, "QCNSTOP", "QCNSTOP", "QHNX", "QQNOP", ""], &config());
        let summary = result.unwrap();
        assert_eq!(summary.unsupported.get("QC"), Some(&2));
        assert_eq!(summary.unsupported.get("QH"), Some(&1));
        assert_eq!(summary.unsupported.len(), 2);
        assert_eq!(
            diagnostics
                .notices
                .iter()
                .filter(|n| matches!(n, Notice::Unsupported { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn rejected_sources() {
        let (result, store, _) = run(&["HDTPS.UCFCATE.PD2001", QS], &config());
        assert!(matches!(
            result,
            Err(SourceError::Header {
                source: HeaderError::RailCif,
                ..
            })
        ));
        assert!(store.journeys().unwrap().is_empty());

        let (result, _, _) = run(&[], &config());
        assert!(matches!(
            result,
            Err(SourceError::Header {
                source: HeaderError::Empty,
                ..
            })
        ));
    }

    #[test]
    fn open_dates_use_configured_bounds() {
        let open = QS.replace("2020010120200112", "        99999999");
        let (_, store, _) = run(&[HEADER, &open, "QOSTOP-REF00082315A  T1F1"], &config());
        let journey = &store.journeys().unwrap()[0];
        assert_eq!(journey.pattern.start, date(2020, 1, 1));
        assert_eq!(journey.pattern.end, date(2021, 1, 1));
    }
}
