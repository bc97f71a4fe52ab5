//! Normalized holding area between decoding and export.

pub mod entities;
pub mod memory;
pub mod model;
pub mod sqlite;
pub mod store;

pub use entities::{Journey, JourneyId, JourneyStopTime, Operator, Route, ServiceTime, Stop};
pub use memory::MemoryStore;
pub use model::{CallDraft, JourneyDraft, RouteKey, Staged, StagingModel};
pub use sqlite::SqliteStore;
pub use store::{ReferentialError, StagingError, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{BankHolidayRule, ExceptionKind, OperatingPattern, SchoolTermRule, WeekdayMask};
    use crate::cif::Direction;
    use crate::coords::GridRef;
    use crate::reconcile::{Reconciler, SourceScope};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(operator: &str, number: &str, direction: Direction) -> RouteKey {
        RouteKey {
            operator: operator.into(),
            number: number.into(),
            direction,
            line: 2,
        }
    }

    fn pattern() -> OperatingPattern {
        let mut pattern = OperatingPattern::new(
            WeekdayMask::parse("1010100").unwrap(),
            date(2020, 1, 1),
            date(2020, 1, 12),
        );
        pattern.school = SchoolTermRule::TermTimeOnly;
        pattern.bank_holidays = BankHolidayRule::Excluded;
        pattern.add_exception(date(2020, 1, 2), ExceptionKind::Add);
        pattern.add_exception(date(2020, 1, 3), ExceptionKind::Remove);
        pattern
    }

    fn draft(route: RouteKey) -> JourneyDraft {
        JourneyDraft {
            route,
            journey_code: "42".into(),
            running_board: Some("101-42".into()),
            vehicle_type: None,
            headsign: Some("Via Aplace".into()),
            pattern: pattern(),
        }
    }

    fn call(location: &str, minutes: u32) -> CallDraft {
        CallDraft {
            location: location.into(),
            arrival: ServiceTime(minutes),
            departure: ServiceTime(minutes + 1),
            pickup_allowed: true,
            set_down_allowed: false,
            timepoint: true,
        }
    }

    /// Runs the same staging sequence against any store.
    fn exercise<S: Store>(store: S) -> S {
        let scope = SourceScope::new("a.cif", 1);
        let mut model = StagingModel::new(store, Reconciler::new(false, false));
        let route = key("OP", "101", Direction::Inbound);

        model.put_operator(&scope, "OP", Some("Operator".into()), None).unwrap();
        model.put_stop(&scope, "S2", None, None).unwrap();
        model
            .put_stop(&scope, "S1", Some("First".into()), Some(GridRef::new("333448", "373764")))
            .unwrap();
        model
            .put_route(&scope, &route, Some("City - Town".into()), None)
            .unwrap();
        let journey = model.put_journey(&scope, draft(route.clone())).unwrap();
        assert_eq!(journey, JourneyId(1));
        model.append_stop_time(&scope, journey, 2, &call("S2", 30)).unwrap();
        model.append_stop_time(&scope, journey, 1, &call("S1", 10)).unwrap();

        // A repeat definition fills the blank phone and keeps stop order.
        model
            .put_operator(&scope, "OP", Some("Operator".into()), Some("0123".into()))
            .unwrap();
        model.put_stop(&scope, "S2", Some("Second".into()), None).unwrap();
        model.into_store()
    }

    fn check<S: Store>(store: &S) {
        let operators = store.operators().unwrap();
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].phone.as_deref(), Some("0123"));

        let stops = store.stops().unwrap();
        assert_eq!(
            stops.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["S2", "S1"]
        );
        assert_eq!(stops[0].name.as_deref(), Some("Second"));
        assert_eq!(stops[1].grid, Some(GridRef::new("333448", "373764")));
        assert_eq!(store.stop("S1").unwrap().unwrap().name.as_deref(), Some("First"));
        assert!(store.stop("S3").unwrap().is_none());

        let routes = store.routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, "OP_101");
        assert_eq!(routes[0].short_name.as_deref(), Some("101"));
        assert_eq!(store.route("OP_101").unwrap(), Some(routes[0].clone()));

        let journeys = store.journeys().unwrap();
        assert_eq!(journeys.len(), 1);
        let journey = &journeys[0];
        assert_eq!(journey.route_id, "OP_101");
        assert_eq!(journey.direction, Direction::Inbound);
        assert_eq!(journey.pattern, pattern());
        assert_eq!(store.journey(JourneyId(1)).unwrap().as_ref(), Some(journey));
        assert!(store.journey(JourneyId(2)).unwrap().is_none());

        let times = store.stop_times(JourneyId(1)).unwrap();
        assert_eq!(times.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(times[0].stop_id, "S1");
        assert_eq!(times[0].departure, ServiceTime(11));
        assert!(times[0].pickup_allowed && !times[0].set_down_allowed && times[0].timepoint);
        assert!(store.stop_times(JourneyId(9)).unwrap().is_empty());
    }

    #[test]
    fn memory_store() {
        let store = exercise(MemoryStore::new());
        check(&store);
    }

    #[test]
    fn sqlite_store() {
        let store = exercise(SqliteStore::open_in_memory().unwrap());
        check(&store);
    }

    #[test]
    fn sqlite_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.db");
        drop(exercise(SqliteStore::open(&path).unwrap()));
        check(&SqliteStore::open(&path).unwrap());
    }

    fn referential_failures<S: Store>(store: S) {
        let scope = SourceScope::new("a.cif", 1);
        let mut model = StagingModel::new(store, Reconciler::new(false, false));
        let route = key("OP", "101", Direction::Outbound);

        let err = model.put_route(&scope, &route, None, None).unwrap_err();
        assert!(matches!(
            err,
            StagingError::Referential(ReferentialError { parent_kind: "operator", .. })
        ));

        let err = model.put_journey(&scope, draft(route.clone())).unwrap_err();
        assert!(matches!(
            err,
            StagingError::Referential(ReferentialError { parent_kind: "route", .. })
        ));

        model.put_operator(&scope, "OP", None, None).unwrap();
        model.put_route(&scope, &route, None, None).unwrap();
        // The failed journey did not consume a sequence number.
        let journey = model.put_journey(&scope, draft(route)).unwrap();
        assert_eq!(journey, JourneyId(1));

        let err = model.append_stop_time(&scope, journey, 1, &call("S1", 0)).unwrap_err();
        assert!(matches!(
            err,
            StagingError::Referential(ReferentialError { parent_kind: "stop", .. })
        ));
        model.put_stop(&scope, "S1", None, None).unwrap();
        let err = model.append_stop_time(&scope, JourneyId(7), 1, &call("S1", 0)).unwrap_err();
        assert!(matches!(
            err,
            StagingError::Referential(ReferentialError { parent_kind: "journey", .. })
        ));
    }

    #[test]
    fn referential_integrity_memory() {
        referential_failures(MemoryStore::new());
    }

    #[test]
    fn referential_integrity_sqlite() {
        referential_failures(SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn merges_across_sources() {
        let first = SourceScope::new("a.cif", 1);
        let second = SourceScope::new("b.cif", 2);
        let mut model = StagingModel::new(MemoryStore::new(), Reconciler::new(false, false));

        let staged = model.put_operator(&first, "OP", Some("Buses".into()), None).unwrap();
        assert!(staged.warning.is_none());
        let staged = model.put_operator(&second, "OP", Some("Coaches".into()), None).unwrap();
        assert_eq!(staged.id, "OP");
        assert!(staged.warning.is_some());
        assert_eq!(
            model.store().operator("OP").unwrap().unwrap().name.as_deref(),
            Some("Buses")
        );

        let route = key("OP", "7", Direction::Outbound);
        model.put_route(&first, &route, Some("A - B".into()), None).unwrap();
        let back = key("OP", "7", Direction::Inbound);
        let staged = model.put_route(&second, &back, None, Some("B - A".into())).unwrap();
        assert!(staged.warning.is_none());
        let routes = model.store().routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].long_name().as_deref(), Some("A - B | B - A"));
        assert_eq!(
            model.reconciler().shared(crate::reconcile::EntityKind::Route),
            vec!["OP_7".to_string()]
        );
    }

    #[test]
    fn unique_mode_keeps_sources_apart() {
        let first = SourceScope::new("a.cif", 1);
        let second = SourceScope::new("b.cif", 2);
        let mut model = StagingModel::new(MemoryStore::new(), Reconciler::new(true, false));
        model.put_operator(&first, "OP", Some("Buses".into()), None).unwrap();
        let staged = model.put_operator(&second, "OP", Some("Coaches".into()), None).unwrap();
        assert!(staged.warning.is_none());
        assert_eq!(staged.id, "OP_0002");
        assert_eq!(model.store().operators().unwrap().len(), 2);
    }
}
