use crate::staging::entities::{Journey, JourneyId, JourneyStopTime, Operator, Route, Stop};
use thiserror::Error;

/// A staged row points at a parent that was never staged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} {id} references unknown {parent_kind} {parent_id}")]
pub struct ReferentialError {
    pub kind: &'static str,
    pub id: String,
    pub parent_kind: &'static str,
    pub parent_id: String,
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error(transparent)]
    Referential(#[from] ReferentialError),
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),
    /// A stored value could not be read back
    #[error("corrupt staged value: {0}")]
    Corrupt(String),
}

/// Keyed storage for staged entities.
///
/// `put_*` replaces an existing row with the same key but keeps its position
/// in listings, which follow first insertion order. Journeys list in id
/// order and stop times in sequence order.
pub trait Store {
    fn operator(&self, id: &str) -> Result<Option<Operator>, StagingError>;
    fn stop(&self, id: &str) -> Result<Option<Stop>, StagingError>;
    fn route(&self, id: &str) -> Result<Option<Route>, StagingError>;
    fn journey(&self, id: JourneyId) -> Result<Option<Journey>, StagingError>;

    fn put_operator(&mut self, operator: Operator) -> Result<(), StagingError>;
    /// Fails with a [`ReferentialError`] when the operator is not staged.
    fn put_route(&mut self, route: Route) -> Result<(), StagingError>;
    fn put_stop(&mut self, stop: Stop) -> Result<(), StagingError>;
    /// Fails with a [`ReferentialError`] when the route is not staged.
    fn put_journey(&mut self, journey: Journey) -> Result<(), StagingError>;
    /// Fails with a [`ReferentialError`] when the journey or stop is not staged.
    fn append_stop_time(&mut self, stop_time: JourneyStopTime) -> Result<(), StagingError>;

    fn operators(&self) -> Result<Vec<Operator>, StagingError>;
    fn stops(&self) -> Result<Vec<Stop>, StagingError>;
    fn routes(&self) -> Result<Vec<Route>, StagingError>;
    fn journeys(&self) -> Result<Vec<Journey>, StagingError>;
    fn stop_times(&self, journey: JourneyId) -> Result<Vec<JourneyStopTime>, StagingError>;
}

pub(crate) fn missing(
    kind: &'static str,
    id: impl ToString,
    parent_kind: &'static str,
    parent_id: impl ToString,
) -> StagingError {
    StagingError::Referential(ReferentialError {
        kind,
        id: id.to_string(),
        parent_kind,
        parent_id: parent_id.to_string(),
    })
}
