use super::task::PoolTask;

/// Public status of an execution slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    /// Ready to take the queue head.
    Idle,
    /// Executing the named task.
    Busy {
        /// Bound task name.
        task: String,
    },
}

/// One reusable execution slot.
pub(super) struct Slot {
    pub id: usize,
    /// Task bound while executing; `None` when idle.
    pub binding: Option<PoolTask>,
}

impl Slot {
    pub fn new(id: usize) -> Self {
        Self { id, binding: None }
    }

    pub fn is_idle(&self) -> bool {
        self.binding.is_none()
    }

    pub fn status(&self) -> SlotStatus {
        match &self.binding {
            None => SlotStatus::Idle,
            Some(task) => SlotStatus::Busy {
                task: task.name.clone(),
            },
        }
    }
}
