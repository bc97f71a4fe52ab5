//! Typed ATCO-CIF records.
//!
//! Each line of a source is one record, identified by its first two
//! characters. Column offsets below are zero-based.

use crate::calendar::pattern::{BankHolidayRule, ExceptionKind, SchoolTermRule, WeekdayMask};
use crate::cif::error::{DecodeError, HeaderError};
use crate::cif::fields::{ClockTime, DateField, Fields};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    JourneyHeader(JourneyHeader),
    DateRunning(DateRunning),
    Note(Note),
    Call(Call),
    Repetition(Repetition),
    Location(Location),
    LocationGrid(LocationGrid),
    Operator(Operator),
    RouteDescription(RouteDescription),
    /// Known record that carries nothing of use (including blank lines).
    Ignored(String),
    /// Record type this converter does not handle.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIdentifier {
    QS, // Journey Header
    QE, // Journey Date Running
    QN, // Journey Note
    ZN, // AIM Journey Note
    QO, // Journey Origin
    QI, // Journey Intermediate
    QT, // Journey Destination
    QR, // Journey Repetition
    QL, // Location
    QB, // Additional Location Information
    QP, // Operator
    QD, // Route Description
    QQ, // Vehicle Type
    QV, // Vehicle Type
    ZG, // AIM Journey Grouping
    ZJ, // AIM Journey Timing Point
    Other,
}

impl RecordIdentifier {
    pub fn from_line(line: &str) -> Self {
        match line.as_bytes().get(0..2) {
            Some(b"QS") => RecordIdentifier::QS,
            Some(b"QE") => RecordIdentifier::QE,
            Some(b"QN") => RecordIdentifier::QN,
            Some(b"ZN") => RecordIdentifier::ZN,
            Some(b"QO") => RecordIdentifier::QO,
            Some(b"QI") => RecordIdentifier::QI,
            Some(b"QT") => RecordIdentifier::QT,
            Some(b"QR") => RecordIdentifier::QR,
            Some(b"QL") => RecordIdentifier::QL,
            Some(b"QB") => RecordIdentifier::QB,
            Some(b"QP") => RecordIdentifier::QP,
            Some(b"QD") => RecordIdentifier::QD,
            Some(b"QQ") => RecordIdentifier::QQ,
            Some(b"QV") => RecordIdentifier::QV,
            Some(b"ZG") => RecordIdentifier::ZG,
            Some(b"ZJ") => RecordIdentifier::ZJ,
            _ => RecordIdentifier::Other,
        }
    }
}

/// Why a record type is left out of the feed.
pub fn unsupported_reason(code: &str) -> &'static str {
    match code {
        "OB" | "ZA" | "ZB" => "AIM timing point detail",
        "QA" => "alternative stop location",
        "QC" => "stop clusters, unimplemented: stop parent",
        "QG" | "QJ" | "QW" => "interchange times, unimplemented: transfers",
        "QH" => "bank holiday dates, overwritten by the bank holiday file",
        "QX" => "route association",
        "QY" => "journey association, unimplemented: block",
        "ZD" => "AIM valid period",
        "ZE" => "AIM hail-and-ride, unimplemented: continuous_pickup",
        "ZL" => "AIM stops including circulars",
        "ZS" => "AIM reference",
        "ZT" => "AIM school term dates, overwritten by the school term file",
        _ => "unknown record type",
    }
}

/// Transaction type at column 2 of the journey, location and operator records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    New,
    Revise,
    Delete,
}

impl Transaction {
    fn decode(fields: &Fields) -> Result<Self, DecodeError> {
        match fields.byte(2) {
            b'N' | b' ' => Ok(Transaction::New),
            b'R' => Ok(Transaction::Revise),
            b'D' => Ok(Transaction::Delete),
            other => Err(fields.malformed("transaction type", &[other])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn from_indicator(indicator: u8) -> Self {
        match indicator {
            b'I' => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }
}

/// File header, the first line of every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: String,
    pub originator: String,
    pub product: String,
}

impl Header {
    pub fn decode(line: &str) -> Result<Header, HeaderError> {
        let line = line.trim_start_matches('\u{feff}');
        if line.trim().is_empty() {
            return Err(HeaderError::Empty);
        }
        if line.starts_with("HDTPS") {
            return Err(HeaderError::RailCif);
        }
        if !line.starts_with("ATCO-CIF") {
            return Err(HeaderError::NotCif);
        }
        // Only used for their text, never for width checks.
        let fields = Fields::new("header", line, 0).map_err(|_| HeaderError::NotCif)?;
        let version = fields.text(8..10);
        if version != "05" {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        Ok(Header {
            version,
            originator: fields.text(12..44),
            product: fields.text(44..60),
        })
    }
}

/// QS: opens a journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyHeader {
    pub transaction: Transaction,
    pub operator: String,
    pub journey_code: String,
    pub start: DateField,
    pub end: DateField,
    pub weekdays: WeekdayMask,
    pub school: SchoolTermRule,
    pub bank_holidays: BankHolidayRule,
    pub route_number: String,
    pub running_board: Option<String>,
    pub vehicle_type: Option<String>,
    pub direction: Direction,
}

impl JourneyHeader {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QS", line, 65)?;
        let days = fields.raw(29..36);
        let weekdays = std::str::from_utf8(days)
            .ok()
            .and_then(WeekdayMask::parse)
            .ok_or_else(|| fields.malformed("operating days", days))?;
        Ok(JourneyHeader {
            transaction: Transaction::decode(&fields)?,
            operator: fields.text(3..7),
            journey_code: fields.text(7..13),
            start: fields.date(13..21, "start date")?,
            end: fields.date(21..29, "end date")?,
            weekdays,
            school: SchoolTermRule::from_indicator(fields.byte(36)),
            bank_holidays: BankHolidayRule::from_indicator(fields.byte(37)),
            route_number: fields.text(38..42),
            running_board: fields.opt_text(42..48),
            vehicle_type: fields.opt_text(48..56),
            direction: Direction::from_indicator(fields.byte(64)),
        })
    }
}

/// QE: extra or withdrawn running dates for the open journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRunning {
    pub start: DateField,
    pub end: DateField,
    pub kind: ExceptionKind,
}

impl DateRunning {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QE", line, 19)?;
        let kind = match fields.byte(18) {
            b'0' => ExceptionKind::Remove,
            _ => ExceptionKind::Add,
        };
        Ok(DateRunning {
            start: fields.date(2..10, "start date")?,
            end: fields.date(10..18, "end date")?,
            kind,
        })
    }
}

/// QN / ZN: free-text note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub text: String,
}

impl Note {
    fn decode(code: &'static str, line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new(code, line, 8)?;
        Ok(Note { text: fields.rest(7) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Origin,
    Intermediate,
    Destination,
}

/// Boarding activity at a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    PickUpAndSetDown,
    PickUpOnly,
    SetDownOnly,
    PassOnly,
}

impl Activity {
    pub fn pickup_allowed(&self) -> bool {
        matches!(self, Activity::PickUpAndSetDown | Activity::PickUpOnly)
    }

    pub fn set_down_allowed(&self) -> bool {
        matches!(self, Activity::PickUpAndSetDown | Activity::SetDownOnly)
    }
}

/// QO / QI / QT: one stop of the open journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub location: String,
    pub arrival: ClockTime,
    pub departure: ClockTime,
    pub activity: Activity,
    pub bay: Option<String>,
    pub timing_point: bool,
}

impl Call {
    fn decode_origin(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QO", line, 23)?;
        let departure = fields.time(14..18, "departure time")?;
        Ok(Call {
            kind: CallKind::Origin,
            location: fields.text(2..14),
            arrival: departure,
            departure,
            activity: Activity::PickUpOnly,
            bay: fields.opt_text(18..21),
            timing_point: fields.raw(21..23) == b"T1",
        })
    }

    fn decode_intermediate(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QI", line, 28)?;
        let activity = match fields.byte(22) {
            b'B' => Activity::PickUpAndSetDown,
            b'P' => Activity::PickUpOnly,
            b'S' => Activity::SetDownOnly,
            b'N' => Activity::PassOnly,
            other => return Err(fields.malformed("activity", &[other])),
        };
        Ok(Call {
            kind: CallKind::Intermediate,
            location: fields.text(2..14),
            arrival: fields.time(14..18, "arrival time")?,
            departure: fields.time(18..22, "departure time")?,
            activity,
            bay: fields.opt_text(23..26),
            timing_point: fields.raw(26..28) == b"T1",
        })
    }

    fn decode_destination(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QT", line, 23)?;
        let arrival = fields.time(14..18, "arrival time")?;
        Ok(Call {
            kind: CallKind::Destination,
            location: fields.text(2..14),
            arrival,
            departure: arrival,
            activity: Activity::SetDownOnly,
            bay: fields.opt_text(18..21),
            timing_point: fields.raw(21..23) == b"T1",
        })
    }
}

/// QR: a copy of the open journey at another departure time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repetition {
    pub location: String,
    pub departure: ClockTime,
    pub journey_code: String,
    pub running_board: Option<String>,
}

impl Repetition {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QR", line, 31)?;
        Ok(Repetition {
            location: fields.text(2..14),
            departure: fields.time(14..18, "departure time")?,
            journey_code: fields.text(18..24),
            running_board: fields.opt_text(24..30),
        })
    }
}

/// QL: stop name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub transaction: Transaction,
    pub location: String,
    pub name: Option<String>,
}

impl Location {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QL", line, 16)?;
        Ok(Location {
            transaction: Transaction::decode(&fields)?,
            location: fields.text(3..15),
            name: fields.opt_text(15..63),
        })
    }
}

/// QB: stop grid reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationGrid {
    pub transaction: Transaction,
    pub location: String,
    pub easting: String,
    pub northing: String,
}

impl LocationGrid {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QB", line, 24)?;
        Ok(LocationGrid {
            transaction: Transaction::decode(&fields)?,
            location: fields.text(3..15),
            easting: fields.text(15..23),
            northing: fields.text(23..31),
        })
    }
}

/// QP: operator details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub transaction: Transaction,
    pub code: String,
    pub name: Option<String>,
    pub legal_name: Option<String>,
    /// Contact telephone, falling back to the enquiry number.
    pub phone: Option<String>,
}

impl Operator {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QP", line, 32)?;
        Ok(Operator {
            transaction: Transaction::decode(&fields)?,
            code: fields.text(3..7),
            name: fields.opt_text(7..31),
            legal_name: fields.opt_text(31..79),
            phone: fields.opt_text(91..103).or_else(|| fields.opt_text(79..91)),
        })
    }
}

/// QD: route description for one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescription {
    pub transaction: Transaction,
    pub operator: String,
    pub route_number: String,
    pub direction: Direction,
    pub description: Option<String>,
}

impl RouteDescription {
    fn decode(line: &str) -> Result<Self, DecodeError> {
        let fields = Fields::new("QD", line, 13)?;
        Ok(RouteDescription {
            transaction: Transaction::decode(&fields)?,
            operator: fields.text(3..7),
            route_number: fields.text(7..11),
            direction: Direction::from_indicator(fields.byte(11)),
            description: Some(fields.rest(12)).filter(|s| !s.is_empty()),
        })
    }
}

/// Decode one body line of a source.
pub fn decode(line: &str) -> Result<Record, DecodeError> {
    match RecordIdentifier::from_line(line) {
        RecordIdentifier::QS => JourneyHeader::decode(line).map(Record::JourneyHeader),
        RecordIdentifier::QE => DateRunning::decode(line).map(Record::DateRunning),
        RecordIdentifier::QN => Note::decode("QN", line).map(Record::Note),
        RecordIdentifier::ZN => Note::decode("ZN", line).map(Record::Note),
        RecordIdentifier::QO => Call::decode_origin(line).map(Record::Call),
        RecordIdentifier::QI => Call::decode_intermediate(line).map(Record::Call),
        RecordIdentifier::QT => Call::decode_destination(line).map(Record::Call),
        RecordIdentifier::QR => Repetition::decode(line).map(Record::Repetition),
        RecordIdentifier::QL => Location::decode(line).map(Record::Location),
        RecordIdentifier::QB => LocationGrid::decode(line).map(Record::LocationGrid),
        RecordIdentifier::QP => Operator::decode(line).map(Record::Operator),
        RecordIdentifier::QD => RouteDescription::decode(line).map(Record::RouteDescription),
        RecordIdentifier::QQ
        | RecordIdentifier::QV
        | RecordIdentifier::ZG
        | RecordIdentifier::ZJ => Ok(Record::Ignored(code_of(line))),
        RecordIdentifier::Other if line.trim().is_empty() => Ok(Record::Ignored(String::new())),
        RecordIdentifier::Other => Ok(Record::Unsupported(code_of(line))),
    }
}

fn code_of(line: &str) -> String {
    line.chars().take(2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> DateField {
        DateField::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    const QS: &str = "QSNOP  42    20200101202001121010100  101 101-42BIGBUS  TC=10142I";

    #[test]
    fn header() {
        let header = Header::decode("ATCO-CIF0500Electronic Registration         MIA 4.20.18     20200113104034").unwrap();
        assert_eq!(header.version, "05");
        assert_eq!(header.originator, "Electronic Registration");
        assert_eq!(header.product, "MIA 4.20.18");
    }

    #[test]
    fn bad_headers() {
        assert_eq!(Header::decode(""), Err(HeaderError::Empty));
        assert_eq!(Header::decode("HDTPS.UCFCATE.PD2001"), Err(HeaderError::RailCif));
        assert_eq!(Header::decode("QSNOP"), Err(HeaderError::NotCif));
        assert_eq!(
            Header::decode("ATCO-CIF0400"),
            Err(HeaderError::UnsupportedVersion("04".into()))
        );
    }

    #[test]
    fn journey_header() {
        let Record::JourneyHeader(qs) = decode(QS).unwrap() else {
            panic!("expected a journey header");
        };
        assert_eq!(qs.transaction, Transaction::New);
        assert_eq!(qs.operator, "OP");
        assert_eq!(qs.journey_code, "42");
        assert_eq!(qs.start, date(2020, 1, 1));
        assert_eq!(qs.end, date(2020, 1, 12));
        assert_eq!(qs.weekdays, WeekdayMask::parse("1010100").unwrap());
        assert_eq!(qs.school, SchoolTermRule::Always);
        assert_eq!(qs.bank_holidays, BankHolidayRule::Normal);
        assert_eq!(qs.route_number, "101");
        assert_eq!(qs.running_board.as_deref(), Some("101-42"));
        assert_eq!(qs.vehicle_type.as_deref(), Some("BIGBUS"));
        assert_eq!(qs.direction, Direction::Inbound);
    }

    #[test]
    fn journey_header_problems() {
        assert!(matches!(
            decode(&QS[..60]),
            Err(DecodeError::Truncated { code: "QS", needed: 65, found: 60 })
        ));
        let bad_days = QS.replace("1010100", "10101X0");
        assert!(matches!(
            decode(&bad_days),
            Err(DecodeError::Malformed { field: "operating days", .. })
        ));
        let bad_date = QS.replace("20200112", "20201312");
        assert!(matches!(
            decode(&bad_date),
            Err(DecodeError::Malformed { field: "end date", .. })
        ));
        let open = QS.replace("20200112", "99999999");
        let Record::JourneyHeader(qs) = decode(&open).unwrap() else {
            panic!("expected a journey header");
        };
        assert_eq!(qs.end, DateField::Open);
    }

    #[test]
    fn date_running() {
        let Record::DateRunning(add) = decode("QE20200101202001021").unwrap() else {
            panic!("expected date running");
        };
        assert_eq!(add.kind, ExceptionKind::Add);
        assert_eq!(add.start, date(2020, 1, 1));
        assert_eq!(add.end, date(2020, 1, 2));
        let Record::DateRunning(remove) = decode("QE20200101202001030").unwrap() else {
            panic!("expected date running");
        };
        assert_eq!(remove.kind, ExceptionKind::Remove);
    }

    #[test]
    fn note() {
        assert_eq!(
            decode("QNA      Via Aplace  ").unwrap(),
            Record::Note(Note { text: "Via Aplace".into() })
        );
    }

    #[test]
    fn calls() {
        let Record::Call(origin) = decode("QOSTOP-REF00032215A  T1F1").unwrap() else {
            panic!("expected a call");
        };
        assert_eq!(origin.kind, CallKind::Origin);
        assert_eq!(origin.location, "STOP-REF0003");
        assert_eq!(origin.departure, ClockTime(22 * 60 + 15));
        assert_eq!(origin.arrival, origin.departure);
        assert_eq!(origin.bay.as_deref(), Some("A"));
        assert!(origin.timing_point);
        assert!(origin.activity.pickup_allowed());
        assert!(!origin.activity.set_down_allowed());

        let Record::Call(stop) = decode("QISTOP-REF000523402341P   T0F0").unwrap() else {
            panic!("expected a call");
        };
        assert_eq!(stop.arrival, ClockTime(23 * 60 + 40));
        assert_eq!(stop.departure, ClockTime(23 * 60 + 41));
        assert_eq!(stop.activity, Activity::PickUpOnly);
        assert!(!stop.timing_point);

        let Record::Call(last) = decode("QTSTOP-REF00070025A  T1F0").unwrap() else {
            panic!("expected a call");
        };
        assert_eq!(last.kind, CallKind::Destination);
        assert_eq!(last.arrival, ClockTime(25));
        assert_eq!(last.activity, Activity::SetDownOnly);
    }

    #[test]
    fn bad_activity() {
        assert!(matches!(
            decode("QISTOP-REF000523402341Z   T0F0"),
            Err(DecodeError::Malformed { field: "activity", .. })
        ));
    }

    #[test]
    fn repetition() {
        let Record::Repetition(qr) = decode("QRSTOP-REF0008234543    101-43BIGBUS  ").unwrap() else {
            panic!("expected a repetition");
        };
        assert_eq!(qr.departure, ClockTime(23 * 60 + 45));
        assert_eq!(qr.journey_code, "43");
        assert_eq!(qr.running_board.as_deref(), Some("101-43"));
    }

    #[test]
    fn locations() {
        assert_eq!(
            decode("QLNSTOP-REF0001The Stop    ").unwrap(),
            Record::Location(Location {
                transaction: Transaction::New,
                location: "STOP-REF0001".into(),
                name: Some("The Stop".into()),
            })
        );
        assert_eq!(
            decode("QBNSTOP-REF0002333448  373764").unwrap(),
            Record::LocationGrid(LocationGrid {
                transaction: Transaction::New,
                location: "STOP-REF0002".into(),
                easting: "333448".into(),
                northing: "373764".into(),
            })
        );
    }

    #[test]
    fn operator() {
        let line = "QPNOP2 Operator Two            Operator Two Ltd    ".to_owned()
            + "                            118500      08712002233 ";
        let Record::Operator(qp) = decode(&line).unwrap() else {
            panic!("expected an operator");
        };
        assert_eq!(qp.code, "OP2");
        assert_eq!(qp.name.as_deref(), Some("Operator Two"));
        assert_eq!(qp.legal_name.as_deref(), Some("Operator Two Ltd"));
        assert_eq!(qp.phone.as_deref(), Some("08712002233"));
    }

    #[test]
    fn operator_enquiry_phone_fallback() {
        let line = format!("QPNOP2 {:<24}{:<48}{:<12}", "Operator Two", "", "118500");
        let Record::Operator(qp) = decode(&line).unwrap() else {
            panic!("expected an operator");
        };
        assert_eq!(qp.phone.as_deref(), Some("118500"));
    }

    #[test]
    fn route_description() {
        assert_eq!(
            decode("QDNOP3 45A OCity - Town ").unwrap(),
            Record::RouteDescription(RouteDescription {
                transaction: Transaction::New,
                operator: "OP3".into(),
                route_number: "45A".into(),
                direction: Direction::Outbound,
                description: Some("City - Town".into()),
            })
        );
    }

    #[test]
    fn deletions_are_decoded() {
        let Record::Location(ql) = decode("QLDSTOP-REF0001The Stop").unwrap() else {
            panic!("expected a location");
        };
        assert_eq!(ql.transaction, Transaction::Delete);
        assert!(decode("QLXSTOP-REF0001The Stop").is_err());
    }

    #[test]
    fn ignored_and_unsupported() {
        assert_eq!(decode("QVNBIGBUS  Big bus").unwrap(), Record::Ignored("QV".into()));
        assert_eq!(decode("ZJ").unwrap(), Record::Ignored("ZJ".into()));
        assert_eq!(decode("   ").unwrap(), Record::Ignored(String::new()));
        assert_eq!(decode("QHN...").unwrap(), Record::Unsupported("QH".into()));
        assert_eq!(decode("XX").unwrap(), Record::Unsupported("XX".into()));
        assert_eq!(unsupported_reason("QY"), "journey association, unimplemented: block");
        assert_eq!(unsupported_reason("XX"), "unknown record type");
    }
}
