//! # Unit status and its aggregation over process members.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a unit.
///
/// A single invocation moves a worker `Idle → Running → {Completed | Error}`.
/// `Paused` and `Completed` workers are bypassed by the supervisor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
    Paused,
}

impl UnitStatus {
    /// Returns a short stable label (lowercase) for logs and milestone ids.
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitStatus::Idle => "idle",
            UnitStatus::Running => "running",
            UnitStatus::Completed => "completed",
            UnitStatus::Error => "error",
            UnitStatus::Paused => "paused",
        }
    }

    /// True for `Completed` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Error)
    }

    /// Aggregate status of a process from its members' statuses.
    ///
    /// `error` beats `running`, which beats `completed`; `completed` requires every
    /// member to be completed and at least one member. Anything else is `idle`.
    ///
    /// ```
    /// use flowvisor::UnitStatus::*;
    /// use flowvisor::UnitStatus;
    ///
    /// assert_eq!(UnitStatus::aggregate([Completed, Running, Error]), Error);
    /// assert_eq!(UnitStatus::aggregate([Completed, Completed]), Completed);
    /// assert_eq!(UnitStatus::aggregate([]), Idle);
    /// ```
    pub fn aggregate<I>(members: I) -> UnitStatus
    where
        I: IntoIterator<Item = UnitStatus>,
    {
        let mut any = false;
        let mut running = false;
        let mut all_completed = true;
        for status in members {
            any = true;
            match status {
                UnitStatus::Error => return UnitStatus::Error,
                UnitStatus::Running => running = true,
                UnitStatus::Completed => {}
                _ => all_completed = false,
            }
        }
        if running {
            UnitStatus::Running
        } else if any && all_completed {
            UnitStatus::Completed
        } else {
            UnitStatus::Idle
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::UnitStatus::*;
    use super::*;

    #[test]
    fn error_wins_over_running() {
        assert_eq!(UnitStatus::aggregate([Running, Error, Idle]), Error);
    }

    #[test]
    fn running_wins_over_completed() {
        assert_eq!(UnitStatus::aggregate([Completed, Running]), Running);
    }

    #[test]
    fn partial_completion_is_idle() {
        assert_eq!(UnitStatus::aggregate([Completed, Idle]), Idle);
        assert_eq!(UnitStatus::aggregate([Completed, Paused]), Idle);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Completed).unwrap(), "\"completed\"");
        let back: UnitStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, Paused);
    }
}
