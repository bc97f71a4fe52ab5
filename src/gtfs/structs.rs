use serde::{Deserialize, Serialize};

pub trait Id {
    fn id(&self) -> &str;
}

/// A GTFS file: its name inside the archive and its column order.
pub trait Table: Serialize {
    const FILE_NAME: &'static str;
    const HEADERS: &'static [&'static str];
}

/// Agency representing a public transit operator.
/// https://gtfs.org/documentation/schedule/reference/#agencytxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: String,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    pub agency_phone: Option<String>,
}

impl Id for Agency {
    fn id(&self) -> &str {
        &self.agency_id
    }
}

impl Table for Agency {
    const FILE_NAME: &'static str = "agency.txt";
    const HEADERS: &'static [&'static str] = &[
        "agency_id",
        "agency_name",
        "agency_url",
        "agency_timezone",
        "agency_phone",
    ];
}

/// A physical stop.
/// https://gtfs.org/documentation/schedule/reference/#stopstxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

impl Id for Stop {
    fn id(&self) -> &str {
        &self.stop_id
    }
}

impl Table for Stop {
    const FILE_NAME: &'static str = "stops.txt";
    const HEADERS: &'static [&'static str] = &["stop_id", "stop_name", "stop_lat", "stop_lon"];
}

/// A transportation route.
/// https://gtfs.org/documentation/schedule/reference/#routestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub agency_id: String,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_type: RouteType,
}

impl Id for Route {
    fn id(&self) -> &str {
        &self.route_id
    }
}

impl Table for Route {
    const FILE_NAME: &'static str = "routes.txt";
    const HEADERS: &'static [&'static str] = &[
        "route_id",
        "agency_id",
        "route_short_name",
        "route_long_name",
        "route_type",
    ];
}

/// Type of transportation used on a route. Written as its numeric code, so
/// extended route types such as 700 (bus service) pass through unchanged.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(from = "u16", into = "u16")]
pub enum RouteType {
    Tram,
    Subway,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
    /// Any other code, including the extended route types.
    Other(u16),
}

impl From<u16> for RouteType {
    fn from(code: u16) -> Self {
        match code {
            0 => RouteType::Tram,
            1 => RouteType::Subway,
            2 => RouteType::Rail,
            3 => RouteType::Bus,
            4 => RouteType::Ferry,
            5 => RouteType::CableTram,
            6 => RouteType::AerialLift,
            7 => RouteType::Funicular,
            11 => RouteType::Trolleybus,
            12 => RouteType::Monorail,
            other => RouteType::Other(other),
        }
    }
}

impl From<RouteType> for u16 {
    fn from(route_type: RouteType) -> Self {
        match route_type {
            RouteType::Tram => 0,
            RouteType::Subway => 1,
            RouteType::Rail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableTram => 5,
            RouteType::AerialLift => 6,
            RouteType::Funicular => 7,
            RouteType::Trolleybus => 11,
            RouteType::Monorail => 12,
            RouteType::Other(code) => code,
        }
    }
}

/// A scheduled trip for a route.
/// https://gtfs.org/documentation/schedule/reference/#tripstxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub trip_short_name: Option<String>,
    pub direction_id: DirectionId,
}

impl Id for Trip {
    fn id(&self) -> &str {
        &self.trip_id
    }
}

impl Table for Trip {
    const FILE_NAME: &'static str = "trips.txt";
    const HEADERS: &'static [&'static str] = &[
        "route_id",
        "service_id",
        "trip_id",
        "trip_headsign",
        "trip_short_name",
        "direction_id",
    ];
}

/// Direction of travel for a trip.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DirectionId {
    #[serde(rename = "0")]
    Outbound,
    #[serde(rename = "1")]
    Inbound,
}

/// Scheduled stop time for a trip.
/// https://gtfs.org/documentation/schedule/reference/#stop_timestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub pickup_type: PickupDropoffType,
    pub drop_off_type: PickupDropoffType,
    pub timepoint: Timepoint,
}

impl Table for StopTime {
    const FILE_NAME: &'static str = "stop_times.txt";
    const HEADERS: &'static [&'static str] = &[
        "trip_id",
        "arrival_time",
        "departure_time",
        "stop_id",
        "stop_sequence",
        "pickup_type",
        "drop_off_type",
        "timepoint",
    ];
}

/// Pickup or drop-off type for a stop.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum PickupDropoffType {
    #[serde(rename = "0")]
    Regular,
    #[serde(rename = "1")]
    NoPickupDropoff,
}

impl PickupDropoffType {
    pub fn allowed(allowed: bool) -> Self {
        if allowed {
            PickupDropoffType::Regular
        } else {
            PickupDropoffType::NoPickupDropoff
        }
    }
}

/// Whether time is a precise point or an estimate.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Timepoint {
    #[serde(rename = "0")]
    Approximate,
    #[serde(rename = "1")]
    Exact,
}

/// Weekly schedule of service.
/// https://gtfs.org/documentation/schedule/reference/#calendartxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: i16,
    pub tuesday: i16,
    pub wednesday: i16,
    pub thursday: i16,
    pub friday: i16,
    pub saturday: i16,
    pub sunday: i16,
    pub start_date: String,
    pub end_date: String,
}

impl Id for Calendar {
    fn id(&self) -> &str {
        &self.service_id
    }
}

impl Table for Calendar {
    const FILE_NAME: &'static str = "calendar.txt";
    const HEADERS: &'static [&'static str] = &[
        "service_id",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
        "start_date",
        "end_date",
    ];
}

/// Exceptions for the schedule of a service.
/// https://gtfs.org/documentation/schedule/reference/#calendar_datestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: String,
    pub exception_type: ExceptionType,
}

impl Table for CalendarDate {
    const FILE_NAME: &'static str = "calendar_dates.txt";
    const HEADERS: &'static [&'static str] = &["service_id", "date", "exception_type"];
}

/// Type of schedule exception.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ExceptionType {
    #[serde(rename = "1")]
    Added,
    #[serde(rename = "2")]
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serialized field order must match the declared headers.
    fn headers_match<T: Table + Serialize>(row: T) {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(row).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, T::HEADERS.join(","));
    }

    #[test]
    fn headers_follow_fields() {
        headers_match(Agency {
            agency_id: "OP".into(),
            agency_name: "Op".into(),
            agency_url: "https://example.com".into(),
            agency_timezone: "Europe/London".into(),
            agency_phone: None,
        });
        headers_match(Stop {
            stop_id: "S".into(),
            stop_name: "Stop".into(),
            stop_lat: 0.0,
            stop_lon: 0.0,
        });
        headers_match(Route {
            route_id: "R".into(),
            agency_id: "OP".into(),
            route_short_name: None,
            route_long_name: None,
            route_type: RouteType::Bus,
        });
        headers_match(Trip {
            route_id: "R".into(),
            service_id: "1".into(),
            trip_id: "1".into(),
            trip_headsign: None,
            trip_short_name: None,
            direction_id: DirectionId::Inbound,
        });
        headers_match(StopTime {
            trip_id: "1".into(),
            arrival_time: "24:25:00".into(),
            departure_time: "24:25:00".into(),
            stop_id: "S".into(),
            stop_sequence: 1,
            pickup_type: PickupDropoffType::Regular,
            drop_off_type: PickupDropoffType::NoPickupDropoff,
            timepoint: Timepoint::Exact,
        });
        headers_match(Calendar {
            service_id: "1".into(),
            monday: 1,
            tuesday: 0,
            wednesday: 1,
            thursday: 0,
            friday: 1,
            saturday: 0,
            sunday: 0,
            start_date: "20200101".into(),
            end_date: "20200112".into(),
        });
        headers_match(CalendarDate {
            service_id: "1".into(),
            date: "20200102".into(),
            exception_type: ExceptionType::Added,
        });
    }

    #[test]
    fn route_type_codes() {
        assert_eq!(RouteType::from(3), RouteType::Bus);
        assert_eq!(RouteType::from(12), RouteType::Monorail);
        assert_eq!(RouteType::from(700), RouteType::Other(700));
        assert_eq!(u16::from(RouteType::Other(200)), 200);
        assert_eq!(u16::from(RouteType::Trolleybus), 11);
    }

    #[test]
    fn extended_route_types_are_written_as_numbers() {
        let route = Route {
            route_id: "R".into(),
            agency_id: "OP".into(),
            route_short_name: None,
            route_long_name: None,
            route_type: RouteType::Other(700),
        };
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&route).unwrap();
        writer.serialize(Route { route_type: RouteType::Ferry, ..route }).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows, vec!["R,OP,,,700", "R,OP,,,4"]);
    }
}
