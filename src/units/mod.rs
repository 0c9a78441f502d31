//! # Units: workers, processes and their read model.
//!
//! - [`Action`] / [`ActionFn`] / [`ActionRef`] - executable work
//! - [`Worker`] - leaf unit wrapping one action with its attempt policy
//! - [`Process`] - composite unit owning an ordered worker list and a [`RunMode`]
//! - [`Dependency`] - `depends_on` entry with optional condition
//! - [`Unit`] - tagged union handed to the registry
//! - [`UnitSnapshot`] - serializable state returned by registry accessors

mod action;
mod dependency;
mod metrics;
mod process;
mod status;
mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use action::{Action, ActionFn, ActionFuture, ActionRef};
pub use dependency::{Condition, Dependency};
pub use metrics::UnitMetrics;
pub use process::{Process, RunMode, DEFAULT_BATCH_SIZE, DEFAULT_ISOLATION_DELAY};
pub use status::UnitStatus;
pub use worker::{ErrorHook, Worker};

/// A registrable unit, resolved once at registration.
#[derive(Clone, Debug)]
pub enum Unit {
    Worker(Worker),
    Process(Process),
}

impl Unit {
    pub fn id(&self) -> &str {
        match self {
            Unit::Worker(w) => w.id(),
            Unit::Process(p) => p.id(),
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            Unit::Worker(_) => UnitKind::Worker,
            Unit::Process(_) => UnitKind::Process,
        }
    }
}

impl From<Worker> for Unit {
    fn from(w: Worker) -> Self {
        Unit::Worker(w)
    }
}

impl From<Process> for Unit {
    fn from(p: Process) -> Self {
        Unit::Process(p)
    }
}

/// Discriminant of [`Unit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Worker,
    Process,
}

/// Point-in-time view of a registered unit.
///
/// This is also the storage format exchanged with a
/// [`StateStore`](crate::StateStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub id: String,
    pub name: String,
    pub kind: UnitKind,
    pub enabled: bool,
    pub status: UnitStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub meta: UnitMetrics,
    pub error: Option<String>,
    /// Owning process of a worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    /// Member ids of a process, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}
