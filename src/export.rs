//! Projection of the staging model onto GTFS tables.

use crate::calendar::{CalendarSynthesizer, ServiceCalendar};
use crate::cif::Direction;
use crate::config::Config;
use crate::coords::GridTransformer;
use crate::diagnostics::{Diagnostics, Notice};
use crate::gtfs::structs::{
    Agency, Calendar, CalendarDate, DirectionId, ExceptionType, PickupDropoffType, Route, Stop,
    StopTime, Timepoint, Trip,
};
use crate::gtfs::Feed;
use crate::staging::{self, StagingError, Store};
use chrono::NaiveDate;

pub const UNKNOWN_OPERATOR: &str = "Unknown Operator";
pub const UNKNOWN_STOP: &str = "Unknown";
const AGENCY_SEARCH_URL: &str = "https://www.google.com/search?q=";

/// Search URL standing in for the operator's website.
pub fn agency_url(name: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{}{}", AGENCY_SEARCH_URL, query)
}

/// Round to 8 decimal places, about a millimetre.
fn round_coordinate(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

fn gtfs_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Builds the feed from a fully staged model.
pub struct Projector<'a> {
    config: &'a Config,
    synthesizer: CalendarSynthesizer<'a>,
    transformer: GridTransformer,
}

impl<'a> Projector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Projector {
            config,
            synthesizer: CalendarSynthesizer::new(&config.bank_holidays, &config.school_terms),
            transformer: GridTransformer::new(config.reference_system, config.grid_figures),
        }
    }

    pub fn project<S: Store, D: Diagnostics>(
        mut self,
        store: &S,
        mut diagnostics: D,
    ) -> Result<Feed, StagingError> {
        let mut feed = Feed {
            agencies: store.operators()?.into_iter().map(|o| self.agency(o)).collect(),
            routes: store.routes()?.into_iter().map(|r| self.route(r)).collect(),
            ..Feed::default()
        };

        let mut unplaced = 0;
        for stop in store.stops()? {
            let (row, placed) = self.stop(stop, &mut diagnostics);
            if !placed {
                unplaced += 1;
            }
            feed.stops.push(row);
        }
        if unplaced > 0 {
            diagnostics.notify(Notice::UnplacedStops(unplaced));
        }

        for journey in store.journeys()? {
            let service = self.synthesizer.assign(&journey.pattern);
            let trip_id = journey.id.to_string();
            for stop_time in store.stop_times(journey.id)? {
                feed.stop_times.push(StopTime {
                    trip_id: trip_id.clone(),
                    arrival_time: stop_time.arrival.to_string(),
                    departure_time: stop_time.departure.to_string(),
                    stop_id: stop_time.stop_id,
                    stop_sequence: stop_time.sequence,
                    pickup_type: PickupDropoffType::allowed(stop_time.pickup_allowed),
                    drop_off_type: PickupDropoffType::allowed(stop_time.set_down_allowed),
                    timepoint: if stop_time.timepoint {
                        Timepoint::Exact
                    } else {
                        Timepoint::Approximate
                    },
                });
            }
            feed.trips.push(Trip {
                route_id: journey.route_id,
                service_id: service.to_string(),
                trip_id,
                trip_headsign: journey.headsign,
                trip_short_name: journey.running_board,
                direction_id: match journey.direction {
                    Direction::Outbound => DirectionId::Outbound,
                    Direction::Inbound => DirectionId::Inbound,
                },
            });
        }

        let config = self.config;
        for calendar in self.synthesizer.into_calendars() {
            let (row, dates) = calendar_rows(config, calendar);
            feed.calendar.push(row);
            feed.calendar_dates.extend(dates);
        }

        log::debug!(
            "projected {} trips onto {} calendars",
            feed.trips.len(),
            feed.calendar.len()
        );
        Ok(feed)
    }

    fn agency(&self, operator: staging::Operator) -> Agency {
        let name = operator.name.unwrap_or_else(|| UNKNOWN_OPERATOR.to_owned());
        Agency {
            agency_id: operator.id,
            agency_url: agency_url(&name),
            agency_name: name,
            agency_timezone: self.config.timezone.clone(),
            agency_phone: operator.phone,
        }
    }

    fn route(&self, route: staging::Route) -> Route {
        Route {
            route_long_name: route.long_name(),
            route_id: route.id,
            agency_id: route.operator_id,
            route_short_name: route.short_name,
            route_type: self.config.mode,
        }
    }

    /// Stop row and whether its grid reference could be placed.
    fn stop<D: Diagnostics>(&mut self, stop: staging::Stop, diagnostics: &mut D) -> (Stop, bool) {
        let (mut lat, mut lon, mut placed) = (0.0, 0.0, true);
        if let Some(grid) = &stop.grid {
            match self.transformer.transform(grid) {
                Ok(point) => {
                    lat = round_coordinate(point.y());
                    lon = round_coordinate(point.x());
                }
                Err(error) => {
                    placed = false;
                    diagnostics.notify(Notice::Unplaced {
                        stop_id: stop.id.clone(),
                        error,
                    });
                }
            }
        }
        let row = Stop {
            stop_id: stop.id,
            stop_name: stop.name.unwrap_or_else(|| UNKNOWN_STOP.to_owned()),
            stop_lat: lat,
            stop_lon: lon,
        };
        (row, placed)
    }
}

/// Calendar row and date exceptions of one service. A service that never
/// runs spans the configured dates with no weekday set.
fn calendar_rows(config: &Config, calendar: ServiceCalendar) -> (Calendar, Vec<CalendarDate>) {
    let service_id = calendar.id.to_string();
    let signature = calendar.signature;
    let (start, end) = signature
        .range
        .unwrap_or((config.first_date, config.final_date));
    let flag = |on: bool| on as i16;
    let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = signature.weekdays.flags();

    let dates = signature
        .additions
        .iter()
        .map(|d| (*d, ExceptionType::Added))
        .chain(signature.removals.iter().map(|d| (*d, ExceptionType::Removed)))
        .map(|(date, exception_type)| CalendarDate {
            service_id: service_id.clone(),
            date: gtfs_date(date),
            exception_type,
        });
    let mut dates: Vec<CalendarDate> = dates.collect();
    dates.sort_by(|a, b| a.date.cmp(&b.date));

    let row = Calendar {
        service_id,
        monday: flag(monday),
        tuesday: flag(tuesday),
        wednesday: flag(wednesday),
        thursday: flag(thursday),
        friday: flag(friday),
        saturday: flag(saturday),
        sunday: flag(sunday),
        start_date: gtfs_date(start),
        end_date: gtfs_date(end),
    };
    (row, dates)
}
