// src/scheduler/mod.rs

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod contract;
pub use contract::{ContractHandler, SideEffect};

/// Descriptor of a registered periodic task. The outer dispatcher owns the
/// firing cadence; handlers only ever see the descriptor of the task that
/// fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identity, unique within the dispatcher.
    pub id: String,
    /// Human-readable schedule tag (cron spec or symbolic cadence).
    pub schedule: String,
}

impl Task {
    pub fn new(id: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schedule: schedule.into(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.schedule)
    }
}

/// Handler invoked when a registered task fires.
///
/// Best-effort by contract: implementations log failures with the task
/// identity and return. They must not panic and must not propagate, so a
/// misbehaving side-effect cannot take the host dispatcher down; the next
/// firing retries.
pub trait TaskHandler: Send + Sync {
    fn run(&self, task: &Task);
}
