//! # Summary of one process run.

use serde::Serialize;

use crate::core::{Bypass, Outcome};

/// Per-worker result of a process run, in process order within each list.
///
/// - `completed`: ran successfully, or was already completed
/// - `failed`: exhausted its attempts (or was cancelled)
/// - `skipped`: false dependency condition or bypassed by the supervisor
/// - `pending`: never became ready (graph runs only)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub process_id: String,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub pending: Vec<String>,
}

impl RunReport {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            ..Self::default()
        }
    }

    /// True when no worker failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of workers the report accounts for.
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.skipped.len() + self.pending.len()
    }

    pub(crate) fn record(&mut self, id: &str, outcome: &Outcome) {
        let bucket = match outcome {
            Outcome::Completed(_) | Outcome::Bypassed(Bypass::AlreadyCompleted) => {
                &mut self.completed
            }
            Outcome::Failed(_) => &mut self.failed,
            Outcome::Bypassed(_) => &mut self.skipped,
        };
        bucket.push(id.to_owned());
    }
}
