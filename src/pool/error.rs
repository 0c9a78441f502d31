use thiserror::Error;

use super::task::TaskStatus;

/// Error returned by [`WorkerPool`](crate::WorkerPool) operations.
///
/// The pool state is never modified when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A task with this name is already queued or running.
    #[error("task {0:?} already exists")]
    DuplicateTask(String),

    /// No queued or running task has this name.
    #[error("task {0:?} not found")]
    TaskNotFound(String),

    /// The operation is not allowed from the task's current status.
    #[error("cannot {op} task {name:?} while {from}")]
    InvalidTransition {
        name: String,
        op: &'static str,
        from: TaskStatus,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::DuplicateTask(_) => "pool_duplicate_task",
            PoolError::TaskNotFound(_) => "pool_task_not_found",
            PoolError::InvalidTransition { .. } => "pool_invalid_transition",
        }
    }
}
