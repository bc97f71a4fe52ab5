use crate::staging::entities::{Journey, JourneyId, JourneyStopTime, Operator, Route, Stop};
use crate::staging::store::{missing, StagingError, Store};
use std::collections::{BTreeMap, HashMap};

/// Rows in insertion order with a key index.
#[derive(Debug)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Table {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|i| &self.rows[*i])
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn upsert(&mut self, id: &str, row: T) {
        match self.index.get(id) {
            Some(i) => self.rows[*i] = row,
            None => {
                self.index.insert(id.to_owned(), self.rows.len());
                self.rows.push(row);
            }
        }
    }
}

/// Default in-process store.
#[derive(Debug)]
pub struct MemoryStore {
    operators: Table<Operator>,
    stops: Table<Stop>,
    routes: Table<Route>,
    journeys: BTreeMap<JourneyId, Journey>,
    stop_times: HashMap<JourneyId, BTreeMap<u32, JourneyStopTime>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            operators: Table::new(),
            stops: Table::new(),
            routes: Table::new(),
            journeys: BTreeMap::new(),
            stop_times: HashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl Store for MemoryStore {
    fn operator(&self, id: &str) -> Result<Option<Operator>, StagingError> {
        Ok(self.operators.get(id).cloned())
    }

    fn stop(&self, id: &str) -> Result<Option<Stop>, StagingError> {
        Ok(self.stops.get(id).cloned())
    }

    fn route(&self, id: &str) -> Result<Option<Route>, StagingError> {
        Ok(self.routes.get(id).cloned())
    }

    fn journey(&self, id: JourneyId) -> Result<Option<Journey>, StagingError> {
        Ok(self.journeys.get(&id).cloned())
    }

    fn put_operator(&mut self, operator: Operator) -> Result<(), StagingError> {
        self.operators.upsert(&operator.id.clone(), operator);
        Ok(())
    }

    fn put_route(&mut self, route: Route) -> Result<(), StagingError> {
        if !self.operators.contains(&route.operator_id) {
            return Err(missing("route", &route.id, "operator", &route.operator_id));
        }
        self.routes.upsert(&route.id.clone(), route);
        Ok(())
    }

    fn put_stop(&mut self, stop: Stop) -> Result<(), StagingError> {
        self.stops.upsert(&stop.id.clone(), stop);
        Ok(())
    }

    fn put_journey(&mut self, journey: Journey) -> Result<(), StagingError> {
        if !self.routes.contains(&journey.route_id) {
            return Err(missing("journey", journey.id, "route", &journey.route_id));
        }
        self.journeys.insert(journey.id, journey);
        Ok(())
    }

    fn append_stop_time(&mut self, stop_time: JourneyStopTime) -> Result<(), StagingError> {
        if !self.journeys.contains_key(&stop_time.journey_id) {
            return Err(missing("stop time", stop_time.sequence, "journey", stop_time.journey_id));
        }
        if !self.stops.contains(&stop_time.stop_id) {
            return Err(missing("stop time", stop_time.sequence, "stop", &stop_time.stop_id));
        }
        self.stop_times
            .entry(stop_time.journey_id)
            .or_default()
            .insert(stop_time.sequence, stop_time);
        Ok(())
    }

    fn operators(&self) -> Result<Vec<Operator>, StagingError> {
        Ok(self.operators.rows.clone())
    }

    fn stops(&self) -> Result<Vec<Stop>, StagingError> {
        Ok(self.stops.rows.clone())
    }

    fn routes(&self) -> Result<Vec<Route>, StagingError> {
        Ok(self.routes.rows.clone())
    }

    fn journeys(&self) -> Result<Vec<Journey>, StagingError> {
        Ok(self.journeys.values().cloned().collect())
    }

    fn stop_times(&self, journey: JourneyId) -> Result<Vec<JourneyStopTime>, StagingError> {
        Ok(self
            .stop_times
            .get(&journey)
            .map(|times| times.values().cloned().collect())
            .unwrap_or_default())
    }
}
