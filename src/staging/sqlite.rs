//! SQLite backed store, for runs too large to stage in memory.

use crate::calendar::{BankHolidayRule, ExceptionKind, OperatingPattern, SchoolTermRule, WeekdayMask};
use crate::cif::Direction;
use crate::coords::GridRef;
use crate::staging::entities::{
    Journey, JourneyId, JourneyStopTime, Operator, Route, ServiceTime, Stop,
};
use crate::staging::store::{missing, StagingError, Store};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS operators (
    id TEXT PRIMARY KEY,
    name TEXT,
    phone TEXT
);
CREATE TABLE IF NOT EXISTS stops (
    id TEXT PRIMARY KEY,
    name TEXT,
    easting TEXT,
    northing TEXT
);
CREATE TABLE IF NOT EXISTS routes (
    id TEXT PRIMARY KEY,
    operator_id TEXT NOT NULL REFERENCES operators(id),
    short_name TEXT,
    outbound TEXT,
    inbound TEXT
);
CREATE TABLE IF NOT EXISTS journeys (
    id INTEGER PRIMARY KEY,
    route_id TEXT NOT NULL REFERENCES routes(id),
    journey_code TEXT NOT NULL,
    running_board TEXT,
    vehicle_type TEXT,
    headsign TEXT,
    direction INTEGER NOT NULL,
    weekdays TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    school TEXT NOT NULL,
    bank_holidays TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS journey_exceptions (
    journey_id INTEGER NOT NULL REFERENCES journeys(id),
    date TEXT NOT NULL,
    removed INTEGER NOT NULL,
    PRIMARY KEY (journey_id, date)
);
CREATE TABLE IF NOT EXISTS stop_times (
    journey_id INTEGER NOT NULL REFERENCES journeys(id),
    sequence INTEGER NOT NULL,
    stop_id TEXT NOT NULL REFERENCES stops(id),
    arrival INTEGER NOT NULL,
    departure INTEGER NOT NULL,
    pickup INTEGER NOT NULL,
    set_down INTEGER NOT NULL,
    timepoint INTEGER NOT NULL,
    PRIMARY KEY (journey_id, sequence)
);
";

pub struct SqliteStore {
    conn: Connection,
}

struct JourneyRow {
    id: u32,
    route_id: String,
    journey_code: String,
    running_board: Option<String>,
    vehicle_type: Option<String>,
    headsign: Option<String>,
    inbound: bool,
    weekdays: String,
    start: NaiveDate,
    end: NaiveDate,
    school: String,
    bank_holidays: String,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StagingError> {
        SqliteStore::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StagingError> {
        SqliteStore::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StagingError> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn })
    }

    fn exists(&self, table: &str, id: &dyn rusqlite::ToSql) -> Result<bool, StagingError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
        Ok(self.conn.query_row(&sql, [id], |row| row.get(0))?)
    }

    fn read_journeys(&self, only: Option<JourneyId>) -> Result<Vec<Journey>, StagingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, route_id, journey_code, running_board, vehicle_type, headsign, direction,
                    weekdays, start_date, end_date, school, bank_holidays
             FROM journeys WHERE ?1 IS NULL OR id = ?1 ORDER BY id",
        )?;
        let row_iter = stmt.query_map(params![only.map(|id| id.0)], |row| {
            Ok(JourneyRow {
                id: row.get(0)?,
                route_id: row.get(1)?,
                journey_code: row.get(2)?,
                running_board: row.get(3)?,
                vehicle_type: row.get(4)?,
                headsign: row.get(5)?,
                inbound: row.get(6)?,
                weekdays: row.get(7)?,
                start: row.get(8)?,
                end: row.get(9)?,
                school: row.get(10)?,
                bank_holidays: row.get(11)?,
            })
        })?;
        let mut rows = Vec::new();
        for row in row_iter {
            rows.push(row?);
        }

        let mut exceptions = self.conn.prepare(
            "SELECT date, removed FROM journey_exceptions WHERE journey_id = ?1 ORDER BY date",
        )?;
        let mut journeys = Vec::with_capacity(rows.len());
        for row in rows {
            let weekdays = WeekdayMask::parse(&row.weekdays)
                .ok_or_else(|| StagingError::Corrupt(format!("weekdays {:?}", row.weekdays)))?;
            let mut pattern = OperatingPattern::new(weekdays, row.start, row.end);
            pattern.school = SchoolTermRule::from_indicator(first_byte(&row.school));
            pattern.bank_holidays = BankHolidayRule::from_indicator(first_byte(&row.bank_holidays));
            let dates = exceptions.query_map(params![row.id], |r| {
                Ok((r.get::<_, NaiveDate>(0)?, r.get::<_, bool>(1)?))
            })?;
            for date in dates {
                let (date, removed) = date?;
                let kind = if removed { ExceptionKind::Remove } else { ExceptionKind::Add };
                pattern.add_exception(date, kind);
            }
            journeys.push(Journey {
                id: JourneyId(row.id),
                route_id: row.route_id,
                journey_code: row.journey_code,
                running_board: row.running_board,
                vehicle_type: row.vehicle_type,
                headsign: row.headsign,
                direction: if row.inbound { Direction::Inbound } else { Direction::Outbound },
                pattern,
            });
        }
        Ok(journeys)
    }
}

fn first_byte(s: &str) -> u8 {
    s.bytes().next().unwrap_or(b' ')
}

fn school_indicator(rule: SchoolTermRule) -> &'static str {
    match rule {
        SchoolTermRule::Always => " ",
        SchoolTermRule::TermTimeOnly => "S",
        SchoolTermRule::HolidaysOnly => "H",
    }
}

fn bank_holiday_indicator(rule: BankHolidayRule) -> &'static str {
    match rule {
        BankHolidayRule::Normal => "0",
        BankHolidayRule::AlsoOn => "A",
        BankHolidayRule::Only => "B",
        BankHolidayRule::Excluded => "X",
    }
}

impl Store for SqliteStore {
    fn operator(&self, id: &str) -> Result<Option<Operator>, StagingError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, phone FROM operators WHERE id = ?1",
                [id],
                |row| {
                    Ok(Operator {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        phone: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn stop(&self, id: &str) -> Result<Option<Stop>, StagingError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, easting, northing FROM stops WHERE id = ?1",
                [id],
                read_stop,
            )
            .optional()?)
    }

    fn route(&self, id: &str) -> Result<Option<Route>, StagingError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, operator_id, short_name, outbound, inbound FROM routes WHERE id = ?1",
                [id],
                read_route,
            )
            .optional()?)
    }

    fn journey(&self, id: JourneyId) -> Result<Option<Journey>, StagingError> {
        Ok(self.read_journeys(Some(id))?.pop())
    }

    fn put_operator(&mut self, operator: Operator) -> Result<(), StagingError> {
        self.conn.execute(
            "INSERT INTO operators (id, name, phone) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, phone = excluded.phone",
            params![operator.id, operator.name, operator.phone],
        )?;
        Ok(())
    }

    fn put_route(&mut self, route: Route) -> Result<(), StagingError> {
        if !self.exists("operators", &route.operator_id)? {
            return Err(missing("route", &route.id, "operator", &route.operator_id));
        }
        self.conn.execute(
            "INSERT INTO routes (id, operator_id, short_name, outbound, inbound) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET operator_id = excluded.operator_id,
                short_name = excluded.short_name, outbound = excluded.outbound, inbound = excluded.inbound",
            params![route.id, route.operator_id, route.short_name, route.outbound, route.inbound],
        )?;
        Ok(())
    }

    fn put_stop(&mut self, stop: Stop) -> Result<(), StagingError> {
        let (easting, northing) = match stop.grid {
            Some(grid) => (Some(grid.easting), Some(grid.northing)),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO stops (id, name, easting, northing) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                easting = excluded.easting, northing = excluded.northing",
            params![stop.id, stop.name, easting, northing],
        )?;
        Ok(())
    }

    fn put_journey(&mut self, journey: Journey) -> Result<(), StagingError> {
        if !self.exists("routes", &journey.route_id)? {
            return Err(missing("journey", journey.id, "route", &journey.route_id));
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO journeys (id, route_id, journey_code, running_board, vehicle_type,
                headsign, direction, weekdays, start_date, end_date, school, bank_holidays)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET route_id = excluded.route_id,
                journey_code = excluded.journey_code, running_board = excluded.running_board,
                vehicle_type = excluded.vehicle_type, headsign = excluded.headsign,
                direction = excluded.direction, weekdays = excluded.weekdays,
                start_date = excluded.start_date, end_date = excluded.end_date,
                school = excluded.school, bank_holidays = excluded.bank_holidays",
            params![
                journey.id.0,
                journey.route_id,
                journey.journey_code,
                journey.running_board,
                journey.vehicle_type,
                journey.headsign,
                journey.direction == Direction::Inbound,
                journey.pattern.weekdays.to_string(),
                journey.pattern.start,
                journey.pattern.end,
                school_indicator(journey.pattern.school),
                bank_holiday_indicator(journey.pattern.bank_holidays),
            ],
        )?;
        tx.execute(
            "DELETE FROM journey_exceptions WHERE journey_id = ?1",
            params![journey.id.0],
        )?;
        for (date, kind) in journey.pattern.exceptions() {
            tx.execute(
                "INSERT INTO journey_exceptions (journey_id, date, removed) VALUES (?1, ?2, ?3)",
                params![journey.id.0, date, kind == ExceptionKind::Remove],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn append_stop_time(&mut self, stop_time: JourneyStopTime) -> Result<(), StagingError> {
        if !self.exists("journeys", &stop_time.journey_id.0)? {
            return Err(missing("stop time", stop_time.sequence, "journey", stop_time.journey_id));
        }
        if !self.exists("stops", &stop_time.stop_id)? {
            return Err(missing("stop time", stop_time.sequence, "stop", &stop_time.stop_id));
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO stop_times (journey_id, sequence, stop_id, arrival, departure,
                pickup, set_down, timepoint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stop_time.journey_id.0,
                stop_time.sequence,
                stop_time.stop_id,
                stop_time.arrival.minutes(),
                stop_time.departure.minutes(),
                stop_time.pickup_allowed,
                stop_time.set_down_allowed,
                stop_time.timepoint,
            ],
        )?;
        Ok(())
    }

    fn operators(&self) -> Result<Vec<Operator>, StagingError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, phone FROM operators ORDER BY rowid")?;
        let operator_iter = stmt.query_map(params![], |row| {
            Ok(Operator {
                id: row.get(0)?,
                name: row.get(1)?,
                phone: row.get(2)?,
            })
        })?;
        let mut operators = Vec::new();
        for operator in operator_iter {
            operators.push(operator?);
        }
        Ok(operators)
    }

    fn stops(&self) -> Result<Vec<Stop>, StagingError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, easting, northing FROM stops ORDER BY rowid")?;
        let stop_iter = stmt.query_map(params![], read_stop)?;
        let mut stops = Vec::new();
        for stop in stop_iter {
            stops.push(stop?);
        }
        Ok(stops)
    }

    fn routes(&self) -> Result<Vec<Route>, StagingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, operator_id, short_name, outbound, inbound FROM routes ORDER BY rowid",
        )?;
        let route_iter = stmt.query_map(params![], read_route)?;
        let mut routes = Vec::new();
        for route in route_iter {
            routes.push(route?);
        }
        Ok(routes)
    }

    fn journeys(&self) -> Result<Vec<Journey>, StagingError> {
        self.read_journeys(None)
    }

    fn stop_times(&self, journey: JourneyId) -> Result<Vec<JourneyStopTime>, StagingError> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, stop_id, arrival, departure, pickup, set_down, timepoint
             FROM stop_times WHERE journey_id = ?1 ORDER BY sequence",
        )?;
        let time_iter = stmt.query_map(params![journey.0], |row| {
            Ok(JourneyStopTime {
                journey_id: journey,
                sequence: row.get(0)?,
                stop_id: row.get(1)?,
                arrival: ServiceTime(row.get(2)?),
                departure: ServiceTime(row.get(3)?),
                pickup_allowed: row.get(4)?,
                set_down_allowed: row.get(5)?,
                timepoint: row.get(6)?,
            })
        })?;
        let mut times = Vec::new();
        for time in time_iter {
            times.push(time?);
        }
        Ok(times)
    }
}

fn read_stop(row: &rusqlite::Row) -> rusqlite::Result<Stop> {
    let easting: Option<String> = row.get(2)?;
    let northing: Option<String> = row.get(3)?;
    Ok(Stop {
        id: row.get(0)?,
        name: row.get(1)?,
        grid: easting
            .zip(northing)
            .map(|(easting, northing)| GridRef { easting, northing }),
    })
}

fn read_route(row: &rusqlite::Row) -> rusqlite::Result<Route> {
    Ok(Route {
        id: row.get(0)?,
        operator_id: row.get(1)?,
        short_name: row.get(2)?,
        outbound: row.get(3)?,
        inbound: row.get(4)?,
    })
}
