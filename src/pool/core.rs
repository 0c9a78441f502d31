use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::panic_message;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::units::ActionRef;

use super::{
    config::PoolConfig,
    error::PoolError,
    slot::{Slot, SlotStatus},
    task::{PoolTask, TaskPatch, TaskStatus},
};

/// Callback executing one task: `(task name, action) -> result`.
///
/// The engine injects the supervisor's attempt loop here.
pub type Executor =
    Arc<dyn Fn(String, ActionRef) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync>;

struct PoolState {
    slots: Vec<Slot>,
    queue: VecDeque<PoolTask>,
    next_arrangement: u64,
    next_slot: usize,
    ticker: Option<CancellationToken>,
}

struct Shared {
    state: Mutex<PoolState>,
    executor: Executor,
    bus: Bus,
    tick: Duration,
}

/// Resizable set of execution slots plus a strictly ordered task queue; cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates a stopped pool with `cfg.size` idle slots.
    pub fn new(cfg: &PoolConfig, executor: Executor, bus: Bus) -> Self {
        let slots = (0..cfg.size).map(Slot::new).collect();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    slots,
                    queue: VecDeque::new(),
                    next_arrangement: 0,
                    next_slot: cfg.size,
                    ticker: None,
                }),
                executor,
                bus,
                tick: cfg.tick.max(Duration::from_millis(1)),
            }),
        }
    }

    /// Queues a task; names must be unique among queued and running tasks.
    ///
    /// Returns the arrangement id of the new task.
    pub fn add_task(&self, name: impl Into<String>, action: ActionRef) -> Result<u64, PoolError> {
        let name = name.into();
        let arrangement_id = {
            let mut st = self.lock();
            if st.contains(&name) {
                drop(st);
                return Err(self.reject(PoolError::DuplicateTask(name)));
            }
            let arrangement_id = st.next_arrangement;
            st.next_arrangement += 1;
            st.queue.push_back(PoolTask {
                name: name.clone(),
                arrangement_id,
                status: TaskStatus::Idle,
                action,
            });
            arrangement_id
        };
        self.shared.bus.publish(
            Event::new(EventKind::TaskQueued)
                .with_unit(name)
                .with_arrangement(arrangement_id),
        );
        Ok(arrangement_id)
    }

    /// Merges `patch` into a queued task.
    pub fn update_task(&self, name: &str, patch: TaskPatch) -> Result<(), PoolError> {
        if patch.status == Some(TaskStatus::Running) {
            let from = self.status_of(name).unwrap_or(TaskStatus::Idle);
            return Err(self.reject(PoolError::InvalidTransition {
                name: name.to_owned(),
                op: "update",
                from,
            }));
        }
        self.with_queued(name, "update", |task| {
            if let Some(action) = patch.action {
                task.action = action;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            Ok(())
        })
    }

    /// Idle → paused.
    pub fn pause_task(&self, name: &str) -> Result<(), PoolError> {
        self.with_queued(name, "pause", |task| match task.status {
            TaskStatus::Idle => {
                task.status = TaskStatus::Paused;
                Ok(())
            }
            from => Err(from),
        })
    }

    /// Paused → idle.
    pub fn resume_task(&self, name: &str) -> Result<(), PoolError> {
        self.with_queued(name, "resume", |task| match task.status {
            TaskStatus::Paused => {
                task.status = TaskStatus::Idle;
                Ok(())
            }
            from => Err(from),
        })
    }

    /// Removes a queued task.
    pub fn cancel_task(&self, name: &str) -> Result<(), PoolError> {
        let res = {
            let mut st = self.lock();
            match st.queue.iter().position(|t| t.name == name) {
                Some(idx) => {
                    st.queue.remove(idx);
                    Ok(())
                }
                None if st.running(name) => Err(PoolError::InvalidTransition {
                    name: name.to_owned(),
                    op: "cancel",
                    from: TaskStatus::Running,
                }),
                None => Err(PoolError::TaskNotFound(name.to_owned())),
            }
        };
        res.map_err(|e| self.reject(e))
    }

    /// Starts the assignment tick; returns `false` if already started.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        let token = {
            let mut st = self.lock();
            if st.ticker.is_some() {
                return false;
            }
            let token = CancellationToken::new();
            st.ticker = Some(token.clone());
            token
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let period = self.shared.tick;
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        WorkerPool { shared }.tick();
                    }
                }
            }
        });
        debug!(period_ms = period.as_millis() as u64, "worker pool started");
        true
    }

    /// Stops the assignment tick; running tasks finish on their own.
    pub fn stop(&self) -> bool {
        match self.lock().ticker.take() {
            Some(token) => {
                token.cancel();
                debug!("worker pool stopped");
                true
            }
            None => false,
        }
    }

    /// True while the assignment tick is active.
    pub fn is_running(&self) -> bool {
        self.lock().ticker.is_some()
    }

    /// Runs one assignment step; returns `true` if a task was dispatched.
    ///
    /// Requires a non-empty queue, an unpaused head and an idle slot. Must be
    /// called inside a tokio runtime.
    ///
    /// The slot is released when the task ends, even if the executor panics.
    pub fn tick(&self) -> bool {
        let (slot_id, task) = {
            let mut st = self.lock();
            match st.queue.front() {
                Some(head) if head.status != TaskStatus::Paused => {}
                _ => return false,
            }
            let Some(slot_idx) = st.slots.iter().position(Slot::is_idle) else {
                return false;
            };
            let Some(mut task) = st.queue.pop_front() else {
                return false;
            };
            task.status = TaskStatus::Running;
            let slot = &mut st.slots[slot_idx];
            slot.binding = Some(task.clone());
            (slot.id, task)
        };

        self.shared.bus.publish(
            Event::new(EventKind::TaskAssigned)
                .with_unit(task.name.as_str())
                .with_slot(slot_id),
        );

        let pool = self.clone();
        let executor = Arc::clone(&self.shared.executor);
        tokio::spawn(async move {
            let run = async { executor(task.name.clone(), Arc::clone(&task.action)).await };
            let err = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(res) => res.err(),
                Err(panic) => Some(TaskError::fail(format!(
                    "executor panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            pool.release(slot_id, &task.name, err);
        });
        true
    }

    /// Grows with idle slots or removes idle slots (stopping early at busy ones).
    ///
    /// Returns the resulting number of slots.
    pub fn resize(&self, size: usize) -> usize {
        let mut st = self.lock();
        while st.slots.len() < size {
            let id = st.next_slot;
            st.next_slot += 1;
            st.slots.push(Slot::new(id));
        }
        while st.slots.len() > size {
            match st.slots.iter().rposition(Slot::is_idle) {
                Some(idx) => {
                    st.slots.remove(idx);
                }
                None => break,
            }
        }
        st.slots.len()
    }

    /// Status of slot `slot_id`, `None` if there is no such slot.
    pub fn worker_status(&self, slot_id: usize) -> Option<SlotStatus> {
        self.lock()
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .map(Slot::status)
    }

    /// Queued tasks followed by running ones, each in arrangement order.
    pub fn list_tasks(&self) -> Vec<PoolTask> {
        let st = self.lock();
        let mut running: Vec<PoolTask> = st
            .slots
            .iter()
            .filter_map(|s| s.binding.clone())
            .collect();
        running.sort_by_key(|t| t.arrangement_id);
        st.queue.iter().cloned().chain(running).collect()
    }

    /// Number of queued (not yet assigned) tasks.
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Current number of slots.
    pub fn size(&self) -> usize {
        self.lock().slots.len()
    }

    /// Ids of the current slots, in creation order.
    pub fn slot_ids(&self) -> Vec<usize> {
        self.lock().slots.iter().map(|s| s.id).collect()
    }

    fn release(&self, slot_id: usize, name: &str, err: Option<TaskError>) {
        if let Some(slot) = self.lock().slots.iter_mut().find(|s| s.id == slot_id) {
            slot.binding = None;
        }
        let mut ev = Event::new(EventKind::TaskReleased)
            .with_unit(name)
            .with_slot(slot_id);
        if let Some(err) = err {
            warn!(task = name, error = %err, "pool task failed");
            ev = ev.with_reason(err.to_string());
        }
        self.shared.bus.publish(ev);
    }

    fn with_queued<F>(&self, name: &str, op: &'static str, f: F) -> Result<(), PoolError>
    where
        F: FnOnce(&mut PoolTask) -> Result<(), TaskStatus>,
    {
        let res = {
            let mut st = self.lock();
            let running = st.running(name);
            match st.queue.iter_mut().find(|t| t.name == name) {
                Some(task) => f(task).map_err(Some),
                None if running => Err(Some(TaskStatus::Running)),
                None => Err(None),
            }
        };
        res.map_err(|from| {
            self.reject(match from {
                Some(from) => PoolError::InvalidTransition {
                    name: name.to_owned(),
                    op,
                    from,
                },
                None => PoolError::TaskNotFound(name.to_owned()),
            })
        })
    }

    fn status_of(&self, name: &str) -> Option<TaskStatus> {
        let st = self.lock();
        if st.running(name) {
            return Some(TaskStatus::Running);
        }
        st.queue.iter().find(|t| t.name == name).map(|t| t.status)
    }

    fn reject(&self, err: PoolError) -> PoolError {
        warn!(reason = err.as_label(), "{err}");
        err
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PoolState {
    fn running(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.binding.as_ref().is_some_and(|t| t.name == name))
    }

    fn contains(&self, name: &str) -> bool {
        self.running(name) || self.queue.iter().any(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ActionFn;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recording_pool(size: usize, log: &Arc<StdMutex<Vec<String>>>) -> WorkerPool {
        let log = Arc::clone(log);
        let executor: Executor = Arc::new(move |name: String, action: ActionRef| {
            log.lock().unwrap().push(name);
            async move { action.call(CancellationToken::new()).await }.boxed()
        });
        let cfg = PoolConfig {
            size,
            ..PoolConfig::default()
        };
        WorkerPool::new(&cfg, executor, Bus::new(64))
    }

    fn sleeper(ms: u64) -> ActionRef {
        ActionFn::arc(move |_ctx: CancellationToken| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!(ms))
        })
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let log = Arc::default();
        let pool = recording_pool(1, &log);
        assert_eq!(pool.add_task("a", sleeper(1)), Ok(0));
        assert_eq!(
            pool.add_task("a", sleeper(1)),
            Err(PoolError::DuplicateTask("a".into()))
        );
        assert_eq!(pool.queue_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_head_blocks_assignment() {
        let log = Arc::default();
        let pool = recording_pool(2, &log);
        pool.add_task("head", sleeper(5)).unwrap();
        pool.add_task("next", sleeper(5)).unwrap();
        pool.pause_task("head").unwrap();

        assert!(!pool.tick());
        assert!(!pool.tick());
        assert_eq!(pool.queue_len(), 2);

        pool.resume_task("head").unwrap();
        assert!(pool.tick());
        assert!(pool.tick());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*log.lock().unwrap(), vec!["head", "next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slots_return_to_idle_after_execution() {
        let log = Arc::default();
        let pool = recording_pool(1, &log);
        pool.add_task("a", sleeper(20)).unwrap();
        pool.add_task("b", sleeper(20)).unwrap();

        assert!(pool.tick());
        assert_eq!(
            pool.worker_status(0),
            Some(SlotStatus::Busy { task: "a".into() })
        );
        assert!(!pool.tick(), "no idle slot");
        assert_eq!(pool.cancel_task("a").unwrap_err().as_label(), "pool_invalid_transition");

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(pool.worker_status(0), Some(SlotStatus::Idle));
        assert!(pool.tick());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_executor_still_frees_the_slot() {
        let executor: Executor = Arc::new(|name: String, action: ActionRef| {
            if name == "bad" {
                panic!("executor exploded");
            }
            async move { action.call(CancellationToken::new()).await }.boxed()
        });
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let cfg = PoolConfig {
            size: 1,
            ..PoolConfig::default()
        };
        let pool = WorkerPool::new(&cfg, executor, bus);
        pool.add_task("bad", sleeper(1)).unwrap();
        pool.add_task("next", sleeper(1)).unwrap();

        assert!(pool.tick());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.worker_status(0), Some(SlotStatus::Idle));

        let released = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::TaskReleased)
            .unwrap();
        assert_eq!(released.unit.as_deref(), Some("bad"));
        assert!(released.reason.unwrap().contains("executor exploded"));

        assert!(pool.tick());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(pool.worker_status(0), Some(SlotStatus::Idle));
        assert_eq!(pool.queue_len(), 0);
    }

    #[tokio::test]
    async fn queued_event_carries_the_full_arrangement_id() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let executor: Executor =
            Arc::new(|_name: String, action: ActionRef| action.call(CancellationToken::new()));
        let pool = WorkerPool::new(&PoolConfig::default(), executor, bus);
        let big = u64::from(u32::MAX) + 7;
        pool.lock().next_arrangement = big;

        assert_eq!(pool.add_task("a", sleeper(1)), Ok(big));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::TaskQueued);
        assert_eq!(ev.arrangement_id, Some(big));
        assert_eq!(ev.attempt, None);
    }

    #[tokio::test]
    async fn invalid_transitions_are_reported() {
        let log = Arc::default();
        let pool = recording_pool(1, &log);
        pool.add_task("a", sleeper(1)).unwrap();

        assert_eq!(
            pool.resume_task("a"),
            Err(PoolError::InvalidTransition {
                name: "a".into(),
                op: "resume",
                from: TaskStatus::Idle,
            })
        );
        assert_eq!(
            pool.pause_task("ghost"),
            Err(PoolError::TaskNotFound("ghost".into()))
        );
        assert!(pool.update_task("a", TaskPatch::status(TaskStatus::Running)).is_err());
        assert_eq!(pool.cancel_task("a"), Ok(()));
        assert_eq!(pool.cancel_task("a"), Err(PoolError::TaskNotFound("a".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn shrink_keeps_busy_slots() {
        let log = Arc::default();
        let pool = recording_pool(2, &log);
        pool.add_task("long", sleeper(100)).unwrap();
        assert!(pool.tick());

        assert_eq!(pool.resize(0), 1);
        assert_eq!(pool.slot_ids(), vec![0]);
        assert_eq!(pool.resize(3), 3);
        assert_eq!(pool.slot_ids(), vec![0, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drives_the_queue() {
        let log = Arc::default();
        let pool = recording_pool(2, &log);
        for name in ["a", "b", "c"] {
            pool.add_task(name, sleeper(1)).unwrap();
        }
        assert!(pool.start());
        assert!(!pool.start());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pool.stop());
        assert!(!pool.is_running());
        assert_eq!(pool.queue_len(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
