use crate::calendar::OperatingPattern;
use crate::cif::Direction;
use crate::coords::GridRef;
use crate::reconcile::{ConsistencyWarning, Reconciler, SourceScope};
use crate::staging::entities::{
    Journey, JourneyId, JourneyStopTime, Operator, Route, ServiceTime, Stop,
};
use crate::staging::store::{StagingError, Store};

/// Source-level identity of a route: operator code, route number and direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub operator: String,
    pub number: String,
    pub direction: Direction,
    /// Line of the journey header that introduced the route.
    pub line: usize,
}

/// A journey as read from a source, before identifiers are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyDraft {
    pub route: RouteKey,
    pub journey_code: String,
    pub running_board: Option<String>,
    pub vehicle_type: Option<String>,
    pub headsign: Option<String>,
    pub pattern: OperatingPattern,
}

/// A stop time as read from a source, before identifiers are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDraft {
    pub location: String,
    pub arrival: ServiceTime,
    pub departure: ServiceTime,
    pub pickup_allowed: bool,
    pub set_down_allowed: bool,
    pub timepoint: bool,
}

/// Outcome of staging an operator, stop or route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged {
    pub id: String,
    pub warning: Option<ConsistencyWarning>,
}

/// Resolves identities through the [`Reconciler`] and writes the merged
/// result into a [`Store`].
pub struct StagingModel<S: Store> {
    store: S,
    reconciler: Reconciler,
    next_journey: u32,
}

impl<S: Store> StagingModel<S> {
    pub fn new(store: S, reconciler: Reconciler) -> Self {
        StagingModel {
            store,
            reconciler,
            next_journey: 1,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn put_operator(
        &mut self,
        scope: &SourceScope,
        code: &str,
        name: Option<String>,
        phone: Option<String>,
    ) -> Result<Staged, StagingError> {
        let id = self.reconciler.final_id(code, scope);
        let existing = self.store.operator(&id)?;
        let incoming = Operator {
            id: id.clone(),
            name,
            phone,
        };
        let (operator, warning) = self.reconciler.reconcile(scope, existing, incoming);
        self.store.put_operator(operator)?;
        Ok(Staged { id, warning })
    }

    pub fn put_stop(
        &mut self,
        scope: &SourceScope,
        location: &str,
        name: Option<String>,
        grid: Option<GridRef>,
    ) -> Result<Staged, StagingError> {
        let id = self.reconciler.final_id(location, scope);
        let existing = self.store.stop(&id)?;
        let incoming = Stop {
            id: id.clone(),
            name,
            grid,
        };
        let (stop, warning) = self.reconciler.reconcile(scope, existing, incoming);
        self.store.put_stop(stop)?;
        Ok(Staged { id, warning })
    }

    /// Stage a route. Its operator must already be staged.
    pub fn put_route(
        &mut self,
        scope: &SourceScope,
        key: &RouteKey,
        outbound: Option<String>,
        inbound: Option<String>,
    ) -> Result<Staged, StagingError> {
        let id = self.route_id(scope, key);
        let existing = self.store.route(&id)?;
        let incoming = Route {
            id: id.clone(),
            operator_id: self.reconciler.final_id(&key.operator, scope),
            short_name: Some(key.number.trim().to_owned()).filter(|n| !n.is_empty()),
            outbound,
            inbound,
        };
        let (route, warning) = self.reconciler.reconcile(scope, existing, incoming);
        self.store.put_route(route)?;
        Ok(Staged { id, warning })
    }

    /// Stage a journey under the next global sequence number. Its route must
    /// already be staged.
    pub fn put_journey(
        &mut self,
        scope: &SourceScope,
        draft: JourneyDraft,
    ) -> Result<JourneyId, StagingError> {
        let id = JourneyId(self.next_journey);
        let journey = Journey {
            id,
            route_id: self.route_id(scope, &draft.route),
            journey_code: draft.journey_code,
            running_board: draft.running_board,
            vehicle_type: draft.vehicle_type,
            headsign: draft.headsign,
            direction: draft.route.direction,
            pattern: draft.pattern,
        };
        self.store.put_journey(journey)?;
        self.next_journey += 1;
        Ok(id)
    }

    /// Stage one stop time. Both the journey and the stop must already be staged.
    pub fn append_stop_time(
        &mut self,
        scope: &SourceScope,
        journey: JourneyId,
        sequence: u32,
        call: &CallDraft,
    ) -> Result<(), StagingError> {
        self.store.append_stop_time(JourneyStopTime {
            journey_id: journey,
            sequence,
            stop_id: self.reconciler.final_id(&call.location, scope),
            arrival: call.arrival,
            departure: call.departure,
            pickup_allowed: call.pickup_allowed,
            set_down_allowed: call.set_down_allowed,
            timepoint: call.timepoint,
        })
    }

    fn route_id(&self, scope: &SourceScope, key: &RouteKey) -> String {
        self.reconciler
            .route_id(&key.operator, &key.number, key.direction, scope, key.line)
    }
}
