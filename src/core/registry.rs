//! # Unit registry with reactive status propagation.
//!
//! The registry stores every registered [`Worker`] and [`Process`] together with its
//! runtime state. Every status mutation goes through [`Registry::update_unit_state`]
//! (or the supervisor's [`Registry::begin_run`]), which:
//! - records metrics on `completed` transitions,
//! - publishes a status event plus a `unit:<id>:<stage>` milestone,
//! - recomputes the aggregate status of the owning process.
//!
//! ## Architecture
//! ```text
//! Supervisor / Engine / host
//!        │  update_unit_state(id, patch)
//!        ▼
//!   RwLock<Inner> ──► Entry(id) ── transition ──► pending events
//!        │                           │
//!        │              owner(id) ──►└─► recompute aggregate(process) ──► pending events
//!        ▼
//!   lock released ──► Bus.publish(pending events)
//! ```
//!
//! ## Rules
//! - Unit ids are unique across workers and processes
//! - A process's member list is the only source of the owner relation
//! - Aggregates are recomputed on every member change, published only when they change
//! - Events are published after the write lock is released
//! - Unknown ids are a no-op (logged at debug level)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::supervisor::Bypass;
use crate::events::{Bus, Event, EventKind, Milestones};
use crate::units::{Process, Unit, UnitKind, UnitMetrics, UnitSnapshot, UnitStatus, Worker};

/// Partial update applied by [`Registry::update_unit_state`].
///
/// `None` fields are left untouched; `error: Some(None)` clears the error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitPatch {
    pub status: Option<UnitStatus>,
    pub enabled: Option<bool>,
    pub error: Option<Option<String>>,
    pub result: Option<Value>,
    pub name: Option<String>,
}

impl UnitPatch {
    /// Patch setting only the status.
    pub fn status(status: UnitStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch setting only the enabled flag.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Records an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    /// Clears the recorded error message.
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Records the result of a successful run.
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Renames the unit.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Runtime state of one unit.
#[derive(Clone, Debug, Default)]
struct UnitState {
    status: UnitStatus,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
    meta: UnitMetrics,
    error: Option<String>,
    result: Option<Value>,
    running_since: Option<Instant>,
}

enum Definition {
    Worker(Worker),
    /// Process settings (worker list emptied) and ordered member ids.
    Process {
        settings: Process,
        members: Vec<String>,
    },
}

struct Entry {
    name: String,
    def: Definition,
    state: UnitState,
}

impl Entry {
    fn kind(&self) -> UnitKind {
        match self.def {
            Definition::Worker(_) => UnitKind::Worker,
            Definition::Process { .. } => UnitKind::Process,
        }
    }

    fn members(&self) -> &[String] {
        match &self.def {
            Definition::Process { members, .. } => members,
            Definition::Worker(_) => &[],
        }
    }
}

#[derive(Default)]
struct Inner {
    units: IndexMap<String, Entry>,
    /// worker id → owning process id.
    owners: HashMap<String, String>,
}

/// Store of all units and their runtime state.
pub struct Registry {
    inner: RwLock<Inner>,
    bus: Bus,
}

impl Registry {
    /// Creates an empty registry publishing on `bus`.
    ///
    /// ### Rules
    /// - Every status change publishes a status event
    /// - `completed` and `error` also publish a `unit:<id>:<stage>` milestone
    pub fn new(bus: Bus) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            bus,
        }
    }

    /// Registers or replaces a unit; a process also registers its workers.
    ///
    /// Re-registering an id keeps its runtime state. Returns `false` (with a warning)
    /// when the id, or one of the process's worker ids, is held by a unit of the
    /// other kind.
    pub async fn register_unit(&self, unit: impl Into<Unit>) -> bool {
        let unit = unit.into();
        let mut pending = Vec::new();
        let accepted = {
            let mut inner = self.inner.write().await;
            match unit {
                Unit::Worker(worker) => inner.upsert_worker(worker),
                Unit::Process(process) => inner.upsert_process(process, &mut pending),
            }
        };
        self.publish(pending);
        accepted
    }

    /// Snapshot of a unit of any kind.
    pub async fn get_unit_by_id(&self, id: &str) -> Option<UnitSnapshot> {
        let inner = self.inner.read().await;
        inner.units.get(id).map(|e| inner.snapshot_of(id, e))
    }

    /// Definition of a registered worker.
    pub async fn get_worker_by_id(&self, id: &str) -> Option<Worker> {
        let inner = self.inner.read().await;
        match &inner.units.get(id)?.def {
            Definition::Worker(w) => Some(w.clone()),
            Definition::Process { .. } => None,
        }
    }

    /// Definition of a registered process, rebuilt with its current member workers.
    pub async fn get_process_by_id(&self, id: &str) -> Option<Process> {
        let inner = self.inner.read().await;
        let Definition::Process { settings, members } = &inner.units.get(id)?.def else {
            return None;
        };
        let workers = members
            .iter()
            .filter_map(|m| match &inner.units.get(m)?.def {
                Definition::Worker(w) => Some(w.clone()),
                Definition::Process { .. } => None,
            })
            .collect();
        Some(Process::from_parts(settings.clone(), workers))
    }

    /// All units in registration order.
    pub async fn list_units(&self) -> Vec<UnitSnapshot> {
        self.list_filtered(None).await
    }

    /// Workers in registration order.
    pub async fn list_workers(&self) -> Vec<UnitSnapshot> {
        self.list_filtered(Some(UnitKind::Worker)).await
    }

    /// Processes in registration order.
    pub async fn list_processes(&self) -> Vec<UnitSnapshot> {
        self.list_filtered(Some(UnitKind::Process)).await
    }

    /// Current status of `id`, `None` if unknown.
    pub async fn status_of(&self, id: &str) -> Option<UnitStatus> {
        self.inner.read().await.units.get(id).map(|e| e.state.status)
    }

    /// Result recorded by the last successful run of `id`.
    pub async fn result_of(&self, id: &str) -> Option<Value> {
        self.inner
            .read()
            .await
            .units
            .get(id)
            .and_then(|e| e.state.result.clone())
    }

    /// Applies `patch` to `id`; unknown ids are ignored.
    pub async fn update_unit_state(&self, id: &str, patch: UnitPatch) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.write().await;
            if !inner.units.contains_key(id) {
                debug!(unit = id, "state update for unknown unit ignored");
                return;
            }
            inner.apply(id, patch, &mut pending);
        }
        self.publish(pending);
    }

    /// Removes a unit; a process takes its workers with it.
    pub async fn release_unit(&self, id: &str) -> bool {
        let mut pending = Vec::new();
        let released = {
            let mut inner = self.inner.write().await;
            inner.release(id, &mut pending)
        };
        self.publish(pending);
        released
    }

    /// Atomically moves a worker into `running` unless it must be bypassed.
    pub(crate) async fn begin_run(&self, id: &str) -> Result<(), Bypass> {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.write().await;
            let entry = match inner.units.get(id) {
                Some(e) if e.kind() == UnitKind::Worker => e,
                _ => return Err(Bypass::Unregistered),
            };
            if !entry.state.enabled {
                return Err(Bypass::Disabled);
            }
            match entry.state.status {
                UnitStatus::Paused => return Err(Bypass::Paused),
                UnitStatus::Completed => return Err(Bypass::AlreadyCompleted),
                UnitStatus::Running => return Err(Bypass::AlreadyRunning),
                UnitStatus::Idle | UnitStatus::Error => {}
            }
            inner.apply(id, UnitPatch::status(UnitStatus::Running), &mut pending);
        }
        self.publish(pending);
        Ok(())
    }

    /// Publishes a `Skipped` event and a `unit:<id>:skipped` milestone; status is untouched.
    pub async fn mark_skipped(&self, id: &str, reason: &str) {
        if !self.inner.read().await.units.contains_key(id) {
            return;
        }
        self.bus.publish(
            Event::new(EventKind::Skipped)
                .with_unit(id)
                .with_reason(reason),
        );
        self.bus.publish(unit_milestone(id, "skipped", json!({ "reason": reason })));
    }

    /// Serializable state of every unit.
    pub async fn snapshot(&self) -> Vec<UnitSnapshot> {
        self.list_units().await
    }

    /// Applies saved state to already registered units of the same kind.
    ///
    /// A saved `running` status is restored as `idle`. Returns how many snapshots
    /// were applied.
    pub async fn restore(&self, snapshots: Vec<UnitSnapshot>) -> usize {
        let mut pending = Vec::new();
        let mut applied = 0;
        {
            let mut inner = self.inner.write().await;
            for snap in snapshots {
                let Some(entry) = inner.units.get_mut(&snap.id) else {
                    debug!(unit = %snap.id, "snapshot for unknown unit skipped");
                    continue;
                };
                if entry.kind() != snap.kind {
                    warn!(unit = %snap.id, "snapshot kind mismatch, skipped");
                    continue;
                }
                let status = match snap.status {
                    UnitStatus::Running => UnitStatus::Idle,
                    other => other,
                };
                if entry.state.status != status {
                    pending.push(Event::for_status(&snap.id, status));
                }
                entry.state.status = status;
                entry.state.enabled = snap.enabled;
                entry.state.last_run = snap.last_run;
                entry.state.meta = snap.meta;
                entry.state.error = snap.error;
                entry.state.running_since = None;
                applied += 1;
            }
            let processes: Vec<String> = inner
                .units
                .iter()
                .filter(|(_, e)| e.kind() == UnitKind::Process)
                .map(|(id, _)| id.clone())
                .collect();
            for pid in processes {
                inner.refresh_aggregate(&pid, &mut pending);
            }
        }
        self.publish(pending);
        applied
    }

    async fn list_filtered(&self, kind: Option<UnitKind>) -> Vec<UnitSnapshot> {
        let inner = self.inner.read().await;
        inner
            .units
            .iter()
            .filter(|(_, e)| kind.map_or(true, |k| e.kind() == k))
            .map(|(id, e)| inner.snapshot_of(id, e))
            .collect()
    }

    fn publish(&self, pending: Vec<Event>) {
        for ev in pending {
            self.bus.publish(ev);
        }
    }
}

impl Inner {
    fn upsert_worker(&mut self, mut worker: Worker) -> bool {
        let id = worker.id().to_owned();
        if self.holds_kind(&id, UnitKind::Process) {
            warn!(unit = %id, "id already registered as a process, worker rejected");
            return false;
        }
        worker.set_process_id(self.owners.get(&id).cloned());
        self.put(Entry {
            name: worker.name().to_owned(),
            state: fresh_state(worker.enabled()),
            def: Definition::Worker(worker),
        });
        true
    }

    fn upsert_process(&mut self, process: Process, pending: &mut Vec<Event>) -> bool {
        let pid = process.id().to_owned();
        if self.holds_kind(&pid, UnitKind::Worker) {
            warn!(unit = %pid, "id already registered as a worker, process rejected");
            return false;
        }
        if let Some(clash) = process
            .workers()
            .iter()
            .find(|w| w.id() == pid || self.holds_kind(w.id(), UnitKind::Process))
        {
            warn!(process = %pid, worker = clash.id(), "worker id already registered as a process, process rejected");
            return false;
        }

        let (settings, workers) = process.into_parts();
        let members: Vec<String> = workers.iter().map(|w| w.id().to_owned()).collect();

        let dropped: Vec<String> = self
            .units
            .get(&pid)
            .map(|e| e.members().iter().filter(|m| !members.contains(m)).cloned().collect())
            .unwrap_or_default();
        for id in dropped {
            self.release(&id, pending);
        }

        let mut touched = Vec::new();
        for mut worker in workers {
            let wid = worker.id().to_owned();
            if let Some(previous) = self.owners.insert(wid.clone(), pid.clone()) {
                if previous != pid {
                    debug!(worker = %wid, from = %previous, to = %pid, "worker moved between processes");
                    if let Some(Definition::Process { members, .. }) =
                        self.units.get_mut(&previous).map(|e| &mut e.def)
                    {
                        members.retain(|m| m != &wid);
                    }
                    touched.push(previous);
                }
            }
            worker.set_process_id(Some(pid.clone()));
            self.put(Entry {
                name: worker.name().to_owned(),
                state: fresh_state(worker.enabled()),
                def: Definition::Worker(worker),
            });
        }

        self.put(Entry {
            name: settings.name().to_owned(),
            state: fresh_state(settings.enabled()),
            def: Definition::Process { settings, members },
        });

        self.refresh_aggregate(&pid, pending);
        for other in touched {
            self.refresh_aggregate(&other, pending);
        }
        true
    }

    /// Inserts `entry`, keeping the runtime state of an existing id.
    fn put(&mut self, mut entry: Entry) {
        let id = match &entry.def {
            Definition::Worker(w) => w.id().to_owned(),
            Definition::Process { settings, .. } => settings.id().to_owned(),
        };
        if let Some(existing) = self.units.get_mut(&id) {
            let enabled = entry.state.enabled;
            entry.state = std::mem::take(&mut existing.state);
            entry.state.enabled = enabled;
            *existing = entry;
        } else {
            self.units.insert(id, entry);
        }
    }

    fn holds_kind(&self, id: &str, kind: UnitKind) -> bool {
        self.units.get(id).is_some_and(|e| e.kind() == kind)
    }

    fn release(&mut self, id: &str, pending: &mut Vec<Event>) -> bool {
        let Some(entry) = self.units.shift_remove(id) else {
            return false;
        };
        match entry.def {
            Definition::Process { members, .. } => {
                for member in members {
                    self.owners.remove(&member);
                    self.units.shift_remove(&member);
                }
            }
            Definition::Worker(_) => {
                if let Some(pid) = self.owners.remove(id) {
                    if let Some(Definition::Process { members, .. }) =
                        self.units.get_mut(&pid).map(|e| &mut e.def)
                    {
                        members.retain(|m| m != id);
                    }
                    self.refresh_aggregate(&pid, pending);
                }
            }
        }
        debug!(unit = id, "unit released");
        true
    }

    fn apply(&mut self, id: &str, patch: UnitPatch, pending: &mut Vec<Event>) {
        let Some(entry) = self.units.get_mut(id) else {
            return;
        };
        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(enabled) = patch.enabled {
            entry.state.enabled = enabled;
        }
        if let Some(result) = patch.result {
            entry.state.result = Some(result);
        }
        if let Some(error) = patch.error {
            entry.state.error = error;
        }
        let changed = match patch.status {
            Some(status) if status != entry.state.status => {
                transition(id, &mut entry.state, status, pending);
                true
            }
            _ => false,
        };
        if changed {
            if let Some(pid) = self.owners.get(id).cloned() {
                self.refresh_aggregate(&pid, pending);
            }
        }
    }

    /// Recomputes a process status from its members and transitions it on change.
    fn refresh_aggregate(&mut self, pid: &str, pending: &mut Vec<Event>) {
        let Some(entry) = self.units.get(pid) else {
            return;
        };
        let aggregate = UnitStatus::aggregate(
            entry
                .members()
                .iter()
                .filter_map(|m| self.units.get(m).map(|e| e.state.status)),
        );
        if let Some(entry) = self.units.get_mut(pid) {
            if entry.state.status != aggregate {
                transition(pid, &mut entry.state, aggregate, pending);
            }
        }
    }

    fn snapshot_of(&self, id: &str, entry: &Entry) -> UnitSnapshot {
        UnitSnapshot {
            id: id.to_owned(),
            name: entry.name.clone(),
            kind: entry.kind(),
            enabled: entry.state.enabled,
            status: entry.state.status,
            last_run: entry.state.last_run,
            meta: entry.state.meta.clone(),
            error: entry.state.error.clone(),
            process_id: self.owners.get(id).cloned(),
            members: entry.members().to_vec(),
        }
    }
}

fn fresh_state(enabled: bool) -> UnitState {
    UnitState {
        enabled,
        ..UnitState::default()
    }
}

/// Moves `state` into `next`, recording metrics and queueing events.
fn transition(id: &str, state: &mut UnitState, next: UnitStatus, pending: &mut Vec<Event>) {
    state.status = next;
    let mut ev = Event::for_status(id, next);
    match next {
        UnitStatus::Running => {
            state.running_since = Some(Instant::now());
            state.error = None;
            pending.push(ev);
        }
        UnitStatus::Completed => {
            let elapsed = state.running_since.take().map(|t| t.elapsed());
            state.meta.record_completion(elapsed);
            state.last_run = Some(Utc::now());
            if let Some(elapsed) = elapsed {
                ev = ev.with_delay(elapsed);
            }
            pending.push(ev);
            let payload = state.result.clone().unwrap_or(Value::Null);
            pending.push(unit_milestone(id, next.as_label(), payload));
        }
        UnitStatus::Error => {
            state.running_since = None;
            state.last_run = Some(Utc::now());
            if let Some(error) = &state.error {
                ev = ev.with_reason(error.as_str());
            }
            pending.push(ev);
            let payload = json!({ "error": state.error });
            pending.push(unit_milestone(id, next.as_label(), payload));
        }
        UnitStatus::Idle | UnitStatus::Paused => {
            state.running_since = None;
            pending.push(ev);
        }
    }
}

fn unit_milestone(id: &str, stage: &str, payload: Value) -> Event {
    Event::new(EventKind::Milestone)
        .with_unit(id)
        .with_milestone(Milestones::unit_id(id, stage), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::units::{ActionFn, ActionRef};
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    fn noop() -> ActionRef {
        ActionFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(Value::Null) })
    }

    fn process(id: &str, workers: &[&str]) -> Process {
        Process::new(id).with_workers(workers.iter().map(|w| Worker::new(*w, noop())))
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    async fn set(reg: &Registry, id: &str, status: UnitStatus) {
        reg.update_unit_state(id, UnitPatch::status(status)).await;
    }

    #[tokio::test]
    async fn process_registration_cascades() {
        let reg = Registry::new(Bus::new(64));
        assert!(reg.register_unit(process("p", &["a", "b"])).await);

        assert_eq!(reg.list_units().await.len(), 3);
        assert_eq!(reg.list_workers().await.len(), 2);
        let a = reg.get_worker_by_id("a").await.unwrap();
        assert_eq!(a.process_id(), Some("p"));
        let p = reg.get_process_by_id("p").await.unwrap();
        let ids: Vec<&str> = p.workers().iter().map(Worker::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(reg.get_unit_by_id("p").await.unwrap().members, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn aggregate_follows_members() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(process("p", &["a", "b", "c"])).await;

        set(&reg, "a", UnitStatus::Completed).await;
        set(&reg, "b", UnitStatus::Running).await;
        set(&reg, "c", UnitStatus::Error).await;
        assert_eq!(reg.status_of("p").await, Some(UnitStatus::Error));

        set(&reg, "b", UnitStatus::Completed).await;
        set(&reg, "c", UnitStatus::Completed).await;
        assert_eq!(reg.status_of("p").await, Some(UnitStatus::Completed));

        for id in ["a", "b", "c"] {
            set(&reg, id, UnitStatus::Idle).await;
        }
        assert_eq!(reg.status_of("p").await, Some(UnitStatus::Idle));
    }

    #[tokio::test]
    async fn aggregate_published_only_on_change() {
        let bus = Bus::new(64);
        let reg = Registry::new(bus.clone());
        reg.register_unit(process("p", &["a", "b"])).await;
        let mut rx = bus.subscribe();

        set(&reg, "a", UnitStatus::Running).await;
        set(&reg, "b", UnitStatus::Running).await;

        let for_p: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.unit.as_deref() == Some("p") && e.status.is_some())
            .collect();
        assert_eq!(for_p.len(), 1);
        assert_eq!(for_p[0].kind, EventKind::Start);
    }

    #[tokio::test]
    async fn unknown_id_is_a_noop() {
        let bus = Bus::new(8);
        let reg = Registry::new(bus.clone());
        let mut rx = bus.subscribe();
        reg.update_unit_state("ghost", UnitPatch::status(UnitStatus::Running))
            .await;
        assert!(reg.get_unit_by_id("ghost").await.is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_records_duration_and_milestone() {
        let bus = Bus::new(64);
        let reg = Registry::new(bus.clone());
        reg.register_unit(Worker::new("w", noop())).await;
        let mut rx = bus.subscribe();

        set(&reg, "w", UnitStatus::Running).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        reg.update_unit_state(
            "w",
            UnitPatch::status(UnitStatus::Completed).with_result(json!({ "ok": true })),
        )
        .await;

        let snap = reg.get_unit_by_id("w").await.unwrap();
        assert_eq!(snap.meta.run_count, 1);
        assert_eq!(snap.meta.execution_times_ms, vec![40]);
        assert_eq!(snap.meta.average_execution_time_ms, 40.0);
        assert!(snap.last_run.is_some());
        assert_eq!(reg.result_of("w").await, Some(json!({ "ok": true })));

        let milestones: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| e.milestone.map(|m| m.to_string()))
            .collect();
        assert_eq!(milestones, vec!["unit:w:completed"]);
    }

    #[tokio::test]
    async fn upsert_keeps_state_and_drops_removed_members() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(process("p", &["a", "b"])).await;
        set(&reg, "a", UnitStatus::Completed).await;

        reg.register_unit(process("p", &["a"])).await;
        assert_eq!(reg.status_of("a").await, Some(UnitStatus::Completed));
        assert!(reg.get_unit_by_id("b").await.is_none());
        assert_eq!(reg.status_of("p").await, Some(UnitStatus::Completed));
    }

    #[tokio::test]
    async fn kinds_do_not_share_ids() {
        let reg = Registry::new(Bus::new(8));
        reg.register_unit(Worker::new("x", noop())).await;
        assert!(!reg.register_unit(Process::new("x")).await);
        assert!(!reg.register_unit(process("p", &["p"])).await);
        assert_eq!(reg.list_processes().await.len(), 0);
    }

    #[tokio::test]
    async fn release_cascades_and_refreshes_owner() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(process("p", &["a", "b"])).await;
        set(&reg, "a", UnitStatus::Completed).await;

        assert!(reg.release_unit("b").await);
        assert_eq!(reg.status_of("p").await, Some(UnitStatus::Completed));

        assert!(reg.release_unit("p").await);
        assert!(reg.list_units().await.is_empty());
        assert!(!reg.release_unit("p").await);
    }

    #[tokio::test]
    async fn begin_run_is_exclusive() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(Worker::new("w", noop())).await;
        reg.register_unit(Worker::new("off", noop()).with_enabled(false))
            .await;

        assert_eq!(reg.begin_run("w").await, Ok(()));
        assert_eq!(reg.begin_run("w").await, Err(Bypass::AlreadyRunning));
        assert_eq!(reg.begin_run("off").await, Err(Bypass::Disabled));
        assert_eq!(reg.begin_run("nope").await, Err(Bypass::Unregistered));

        set(&reg, "w", UnitStatus::Paused).await;
        assert_eq!(reg.begin_run("w").await, Err(Bypass::Paused));
    }

    #[tokio::test]
    async fn entering_running_clears_error() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(Worker::new("w", noop())).await;
        reg.update_unit_state("w", UnitPatch::status(UnitStatus::Error).with_error("boom"))
            .await;
        assert_eq!(reg.get_unit_by_id("w").await.unwrap().error.as_deref(), Some("boom"));

        reg.begin_run("w").await.unwrap();
        assert_eq!(reg.get_unit_by_id("w").await.unwrap().error, None);
    }

    #[tokio::test]
    async fn restore_applies_known_units_only() {
        let reg = Registry::new(Bus::new(64));
        reg.register_unit(process("p", &["a", "b"])).await;
        set(&reg, "a", UnitStatus::Completed).await;
        set(&reg, "b", UnitStatus::Running).await;
        let saved = reg.snapshot().await;

        let fresh = Registry::new(Bus::new(64));
        fresh.register_unit(process("p", &["a", "b"])).await;
        let mut ghost = saved[0].clone();
        ghost.id = "ghost".into();
        let applied = fresh.restore(saved.into_iter().chain([ghost]).collect()).await;

        assert_eq!(applied, 3);
        assert_eq!(fresh.status_of("a").await, Some(UnitStatus::Completed));
        assert_eq!(fresh.status_of("b").await, Some(UnitStatus::Idle));
        assert_eq!(fresh.status_of("p").await, Some(UnitStatus::Idle));
        assert_eq!(
            fresh.get_unit_by_id("a").await.unwrap().meta.run_count,
            1
        );
    }

    #[tokio::test]
    async fn skip_is_reported_without_status_change() {
        let bus = Bus::new(16);
        let reg = Registry::new(bus.clone());
        reg.register_unit(Worker::new("w", noop())).await;
        let mut rx = bus.subscribe();

        reg.mark_skipped("w", "condition on a not met").await;
        let events = drain(&mut rx);
        assert_eq!(events[0].kind, EventKind::Skipped);
        assert_eq!(events[1].milestone.as_deref(), Some("unit:w:skipped"));
        assert_eq!(reg.status_of("w").await, Some(UnitStatus::Idle));
    }
}
