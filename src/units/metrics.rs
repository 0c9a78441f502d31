//! # Execution metrics recorded on every `completed` transition.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Structured metrics of a unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMetrics {
    /// Number of transitions into `completed`.
    pub run_count: u64,
    /// Duration samples in completion order.
    pub execution_times_ms: Vec<u64>,
    /// Mean of `execution_times_ms` (`0.0` when empty).
    pub average_execution_time_ms: f64,
}

impl UnitMetrics {
    /// Records one completion; `elapsed` is `None` when the unit never entered `running`.
    pub fn record_completion(&mut self, elapsed: Option<Duration>) {
        self.run_count += 1;
        if let Some(elapsed) = elapsed {
            let ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
            self.execution_times_ms.push(ms);
            let total: u128 = self.execution_times_ms.iter().map(|v| u128::from(*v)).sum();
            self.average_execution_time_ms = total as f64 / self.execution_times_ms.len() as f64;
        }
    }

    /// Last recorded sample.
    pub fn last_execution_time(&self) -> Option<Duration> {
        self.execution_times_ms
            .last()
            .map(|ms| Duration::from_millis(*ms))
    }
}
