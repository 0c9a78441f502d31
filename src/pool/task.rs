use std::fmt;

use crate::units::ActionRef;

/// Status of a pool task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting in the queue.
    Idle,
    /// Waiting in the queue, blocks assignment while at the head.
    Paused,
    /// Bound to a slot.
    Running,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Paused => "paused",
            TaskStatus::Running => "running",
        })
    }
}

/// Named task in the pool queue.
///
/// `arrangement_id` is assigned at insertion, strictly increasing, and is the only
/// ordering key of the queue.
#[derive(Clone)]
pub struct PoolTask {
    pub(super) name: String,
    pub(super) arrangement_id: u64,
    pub(super) status: TaskStatus,
    pub(super) action: ActionRef,
}

impl PoolTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arrangement_id(&self) -> u64 {
        self.arrangement_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn action(&self) -> &ActionRef {
        &self.action
    }
}

impl fmt::Debug for PoolTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolTask")
            .field("name", &self.name)
            .field("arrangement_id", &self.arrangement_id)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Fields merged into a queued task by `update_task`.
#[derive(Clone, Default)]
pub struct TaskPatch {
    /// Replacement action.
    pub action: Option<ActionRef>,
    /// `Idle` or `Paused`; `Running` is rejected.
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn action(action: ActionRef) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
