use crate::calendar::OperatingPattern;
use crate::cif::Direction;
use crate::coords::GridRef;
use crate::reconcile::{absorb_field, Attributed, Divergence, EntityKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl Attributed for Operator {
    const KIND: EntityKind = EntityKind::Operator;

    fn id(&self) -> &str {
        &self.id
    }

    fn absorb(&mut self, later: &Self) -> Vec<Divergence> {
        let mut divergences = Vec::new();
        absorb_field("name", &mut self.name, &later.name, &mut divergences);
        absorb_field("phone", &mut self.phone, &later.phone, &mut divergences);
        divergences
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub id: String,
    pub name: Option<String>,
    pub grid: Option<GridRef>,
}

impl Attributed for Stop {
    const KIND: EntityKind = EntityKind::Stop;

    fn id(&self) -> &str {
        &self.id
    }

    fn absorb(&mut self, later: &Self) -> Vec<Divergence> {
        let mut divergences = Vec::new();
        absorb_field("name", &mut self.name, &later.name, &mut divergences);
        match (&self.grid, &later.grid) {
            (None, Some(grid)) => self.grid = Some(grid.clone()),
            (Some(kept), Some(grid)) if kept != grid => divergences.push(Divergence {
                field: "grid reference",
                kept: format!("{} {}", kept.easting, kept.northing),
                ignored: format!("{} {}", grid.easting, grid.northing),
            }),
            _ => {}
        }
        divergences
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub operator_id: String,
    pub short_name: Option<String>,
    pub outbound: Option<String>,
    pub inbound: Option<String>,
}

impl Route {
    /// Outbound and inbound descriptions joined with `" | "`, or whichever exists.
    pub fn long_name(&self) -> Option<String> {
        match (&self.outbound, &self.inbound) {
            (Some(out), Some(back)) => Some(format!("{} | {}", out, back)),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        }
    }
}

impl Attributed for Route {
    const KIND: EntityKind = EntityKind::Route;

    fn id(&self) -> &str {
        &self.id
    }

    fn absorb(&mut self, later: &Self) -> Vec<Divergence> {
        let mut divergences = Vec::new();
        if self.operator_id != later.operator_id {
            divergences.push(Divergence {
                field: "operator",
                kept: self.operator_id.clone(),
                ignored: later.operator_id.clone(),
            });
        }
        absorb_field("short name", &mut self.short_name, &later.short_name, &mut divergences);
        absorb_field("outbound description", &mut self.outbound, &later.outbound, &mut divergences);
        absorb_field("inbound description", &mut self.inbound, &later.inbound, &mut divergences);
        divergences
    }
}

/// Global journey sequence number, also used as the exported trip id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JourneyId(pub u32);

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journey {
    pub id: JourneyId,
    pub route_id: String,
    pub journey_code: String,
    pub running_board: Option<String>,
    pub vehicle_type: Option<String>,
    pub headsign: Option<String>,
    pub direction: Direction,
    pub pattern: OperatingPattern,
}

/// Minutes after midnight of the service day. Runs past 24:00 for journeys
/// crossing midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceTime(pub u32);

impl ServiceTime {
    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn offset(&self, minutes: u32) -> ServiceTime {
        ServiceTime(self.0 + minutes)
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:00", self.0 / 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyStopTime {
    pub journey_id: JourneyId,
    /// 1-based position in the journey.
    pub sequence: u32,
    pub stop_id: String,
    pub arrival: ServiceTime,
    pub departure: ServiceTime,
    pub pickup_allowed: bool,
    pub set_down_allowed: bool,
    pub timepoint: bool,
}
