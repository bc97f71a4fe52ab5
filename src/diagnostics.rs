//! Leveled notices raised while converting.
//!
//! The library never prints. Everything worth telling the user goes through
//! a [`Diagnostics`] sink as a [`Notice`].

use crate::cif::LineError;
use crate::coords::CoordError;
use crate::reconcile::ConsistencyWarning;
use crate::staging::ReferentialError;
use log::Level;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A line was skipped because it could not be decoded.
    Malformed(LineError),
    /// A later source redefined an entity differently.
    Consistency(ConsistencyWarning),
    /// A record pointed at a parent that was never staged and was dropped.
    Referential {
        scope: String,
        line: usize,
        error: ReferentialError,
    },
    /// A journey record appeared while no journey was open.
    Detached {
        scope: String,
        line: usize,
        code: String,
    },
    Unsupported {
        scope: String,
        line: usize,
        code: String,
        reason: &'static str,
    },
    /// A record or journey block flagged for deletion was skipped.
    Deleted {
        scope: String,
        line: usize,
        code: String,
    },
    Accepted {
        scope: String,
        line: usize,
        code: String,
    },
    /// A stop whose grid reference could not be placed.
    Unplaced { stop_id: String, error: CoordError },
    /// Stops exported at 0/0 after a failed transform.
    UnplacedStops(usize),
    /// A whole source was skipped. `reason` names the source.
    Rejected { scope: String, reason: String },
    Progress(String),
}

impl Notice {
    pub fn level(&self) -> Level {
        match self {
            Notice::Malformed(_)
            | Notice::Consistency(_)
            | Notice::Referential { .. }
            | Notice::Detached { .. }
            | Notice::UnplacedStops(_)
            | Notice::Rejected { .. } => Level::Warn,
            Notice::Progress(_) => Level::Info,
            Notice::Unsupported { .. }
            | Notice::Deleted { .. }
            | Notice::Accepted { .. }
            | Notice::Unplaced { .. } => Level::Debug,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Malformed(error) => write!(f, "skipped line {}", error),
            Notice::Consistency(warning) => write!(f, "{}", warning),
            Notice::Referential { scope, line, error } => {
                write!(f, "{}:{}: dropped record, {}", scope, line, error)
            }
            Notice::Detached { scope, line, code } => {
                write!(f, "{}:{}: {} record outside of a journey", scope, line, code)
            }
            Notice::Unsupported {
                scope,
                line,
                code,
                reason,
            } => write!(f, "{}:{}: unsupported {} record ({})", scope, line, code, reason),
            Notice::Deleted { scope, line, code } => {
                write!(f, "{}:{}: {} record marked for deletion", scope, line, code)
            }
            Notice::Accepted { scope, line, code } => write!(f, "{}:{}: {}", scope, line, code),
            Notice::Unplaced { stop_id, error } => write!(f, "stop {}: {}", stop_id, error),
            Notice::UnplacedStops(count) => {
                write!(f, "{} stops could not be placed and were left at 0/0", count)
            }
            Notice::Rejected { reason, .. } => write!(f, "skipped {}", reason),
            Notice::Progress(message) => f.write_str(message),
        }
    }
}

/// Receiver of the notices raised by a conversion.
pub trait Diagnostics {
    fn notify(&mut self, notice: Notice);

    /// Whether per-record [`Notice::Accepted`] notices are wanted.
    fn verbose(&self) -> bool {
        true
    }
}

/// Forwards notices to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn notify(&mut self, notice: Notice) {
        log::log!(notice.level(), "{}", notice);
    }

    fn verbose(&self) -> bool {
        log::log_enabled!(Level::Debug)
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingDiagnostics {
    pub notices: Vec<Notice>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        CollectingDiagnostics::default()
    }

    /// Notices at `level` or more severe.
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.level() <= level)
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice)
    }

    fn verbose(&self) -> bool {
        (**self).verbose()
    }
}
