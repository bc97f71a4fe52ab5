//! Identity of operators, stops and routes across sources.
//!
//! By default an entity keeps its source identifier and definitions from
//! several sources merge. In forced-unique mode every identifier is
//! suffixed with the ordinal of the source that declared it, so nothing
//! merges.

use crate::cif::Direction;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The source currently being ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceScope {
    pub label: String,
    /// 1-based position of the source in the run.
    pub ordinal: u32,
}

impl SourceScope {
    pub fn new(label: impl Into<String>, ordinal: u32) -> Self {
        SourceScope {
            label: label.into(),
            ordinal,
        }
    }
}

impl fmt::Display for SourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Operator,
    Stop,
    Route,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Operator => "operator",
            EntityKind::Stop => "stop",
            EntityKind::Route => "route",
        })
    }
}

/// One attribute that a later source defined differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub field: &'static str,
    pub kept: String,
    pub ignored: String,
}

/// A later source redefined an entity with conflicting attributes. The
/// first definition is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub kind: EntityKind,
    pub id: String,
    pub scope: String,
    pub divergences: Vec<Divergence>,
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} conflicts with an earlier definition",
            self.scope, self.kind, self.id
        )?;
        for d in &self.divergences {
            write!(f, "; {} kept {:?}, ignored {:?}", d.field, d.kept, d.ignored)?;
        }
        Ok(())
    }
}

/// Entities that can be merged across sources.
pub trait Attributed {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Fold a later definition into this one. Blank attributes are filled in,
    /// differing ones are kept and returned.
    fn absorb(&mut self, later: &Self) -> Vec<Divergence>;
}

/// Merge helper for one optional attribute.
pub fn absorb_field(
    field: &'static str,
    kept: &mut Option<String>,
    later: &Option<String>,
    divergences: &mut Vec<Divergence>,
) {
    match (kept.as_ref(), later) {
        (None, Some(value)) => *kept = Some(value.clone()),
        (Some(current), Some(value)) if current != value => divergences.push(Divergence {
            field,
            kept: current.clone(),
            ignored: value.clone(),
        }),
        _ => {}
    }
}

pub struct Reconciler {
    unique_ids: bool,
    directional_routes: bool,
    sightings: HashMap<(EntityKind, String), BTreeSet<u32>>,
}

impl Reconciler {
    /// # Parameters
    /// - `unique_ids`: Suffix every identifier with its source ordinal.
    /// - `directional_routes`: Keep inbound journeys on their own route.
    pub fn new(unique_ids: bool, directional_routes: bool) -> Self {
        Reconciler {
            unique_ids,
            directional_routes,
            sightings: HashMap::new(),
        }
    }

    /// Final identifier for a source identifier.
    ///
    /// Blank identifiers become `unknown_{ordinal}`, so every source gets its
    /// own placeholder entity.
    pub fn final_id(&self, raw: &str, scope: &SourceScope) -> String {
        let raw = raw.trim();
        if raw.is_empty() {
            return format!("unknown_{}", scope.ordinal);
        }
        self.scoped(raw.to_owned(), scope)
    }

    /// Final route identifier, derived from the operator code and route number.
    ///
    /// # Parameters
    /// - `line`: Line of the record introducing the route, used when the
    ///   route number is blank.
    pub fn route_id(
        &self,
        operator: &str,
        route_number: &str,
        direction: Direction,
        scope: &SourceScope,
        line: usize,
    ) -> String {
        let (operator, route_number) = (operator.trim(), route_number.trim());
        let mut raw = if route_number.is_empty() {
            format!("unknown_{}_{}", scope.ordinal, line)
        } else {
            format!("{}_{}", operator, route_number)
        };
        if self.directional_routes && direction == Direction::Inbound {
            raw.push_str("_inbd");
        }
        self.scoped(raw, scope)
    }

    pub fn directional_routes(&self) -> bool {
        self.directional_routes
    }

    fn scoped(&self, raw: String, scope: &SourceScope) -> String {
        if self.unique_ids {
            format!("{}_{:04}", raw, scope.ordinal)
        } else {
            raw
        }
    }

    /// Merge an incoming definition with the one already staged, if any.
    ///
    /// # Returns
    /// The entity to stage, and a warning when the definitions conflict.
    pub fn reconcile<T: Attributed>(
        &mut self,
        scope: &SourceScope,
        existing: Option<T>,
        incoming: T,
    ) -> (T, Option<ConsistencyWarning>) {
        self.sightings
            .entry((T::KIND, incoming.id().to_owned()))
            .or_default()
            .insert(scope.ordinal);
        match existing {
            None => (incoming, None),
            Some(mut kept) => {
                let divergences = kept.absorb(&incoming);
                let warning = (!divergences.is_empty()).then(|| ConsistencyWarning {
                    kind: T::KIND,
                    id: kept.id().to_owned(),
                    scope: scope.label.clone(),
                    divergences,
                });
                (kept, warning)
            }
        }
    }

    /// Identifiers of `kind` defined by more than one source, sorted.
    pub fn shared(&self, kind: EntityKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sightings
            .iter()
            .filter(|((k, _), scopes)| *k == kind && scopes.len() > 1)
            .map(|((_, id), _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
