//! # Engine: the embedding surface.
//!
//! [`Engine`] owns the bus, the registry and the supervisor, and routes process
//! runs to the right scheduler.
//!
//! ```text
//! run_process(id)
//!   ├─ unknown / disabled          → warn, empty RunReport
//!   ├─ any worker has depends_on   → schedule::run_graph  (waves, may fail the run)
//!   └─ otherwise                   → schedule::run_mode   (never fails the run)
//!                                          │
//!                                          ▼
//!                               Supervisor::execute(worker) ──► Registry ──► Bus
//! ```
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use flowvisor::{ActionFn, Engine, EngineConfig, Process, RunMode, TaskError, Worker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default());
//!     let ping = ActionFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(json!("pong")) });
//!
//!     engine
//!         .register(
//!             Process::new("checks")
//!                 .with_run_mode(RunMode::Parallel)
//!                 .with_worker(Worker::new("ping", ping)),
//!         )
//!         .await;
//!
//!     let report = engine.run_process("checks").await?;
//!     assert_eq!(report.completed, vec!["ping"]);
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::registry::Registry;
use crate::core::supervisor::{Bypass, Outcome, Supervisor};
use crate::core::EngineBuilder;
use crate::error::EngineError;
use crate::events::{Bus, EventKind, Milestones};
use crate::pool::WorkerPool;
use crate::schedule::{run_graph, run_mode, RunReport};
use crate::store::{StateStore, StoreError};
use crate::subscribers::{Subscribe, Subscription};
use crate::units::Unit;

/// Workflow engine instance.
pub struct Engine {
    cfg: EngineConfig,
    bus: Bus,
    registry: Arc<Registry>,
    supervisor: Supervisor,
    milestones: Milestones,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Engine {
    /// Creates an engine without subscribers.
    pub fn new(cfg: EngineConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::with_bus(cfg, bus, Vec::new())
    }

    /// Starts an [`EngineBuilder`] for attaching subscribers up front.
    pub fn builder(cfg: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(crate) fn with_bus(cfg: EngineConfig, bus: Bus, subscriptions: Vec<Subscription>) -> Self {
        let registry = Arc::new(Registry::new(bus.clone()));
        let supervisor = Supervisor::new(Arc::clone(&registry), bus.clone());
        Self {
            cfg,
            milestones: Milestones::new(bus.clone()),
            bus,
            registry,
            supervisor,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Event bus shared by every component.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Unit registry (status, results, snapshots).
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Supervisor every worker run goes through.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Milestone emitter on the engine bus.
    pub fn milestones(&self) -> &Milestones {
        &self.milestones
    }

    /// Registers (or replaces) a worker or a process.
    pub async fn register(&self, unit: impl Into<Unit>) -> bool {
        self.registry.register_unit(unit).await
    }

    /// Runs every eligible worker of process `id`.
    ///
    /// Worker failures in run-mode executions show up in the report; a graph run
    /// returns [`EngineError`] on a cycle or on the first terminal failure.
    pub async fn run_process(&self, id: &str) -> Result<RunReport, EngineError> {
        let Some(process) = self.registry.get_process_by_id(id).await else {
            warn!(process = id, "run requested for unknown process");
            return Ok(RunReport::new(id));
        };
        let enabled = self
            .registry
            .get_unit_by_id(id)
            .await
            .is_some_and(|s| s.enabled);
        if !enabled {
            warn!(process = id, "process is disabled, run skipped");
            return Ok(RunReport::new(id));
        }

        info!(
            process = id,
            mode = ?process.run_mode(),
            graph = process.has_dependencies(),
            workers = process.workers().len(),
            "running process"
        );
        let report = if process.has_dependencies() {
            match run_graph(&self.supervisor, id, process.workers()).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(process = id, reason = err.as_label(), error = %err, "process run aborted");
                    return Err(err);
                }
            }
        } else {
            run_mode(&self.supervisor, &process).await
        };
        info!(
            process = id,
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            pending = report.pending.len(),
            "process finished"
        );
        Ok(report)
    }

    /// Runs one registered worker through the supervisor.
    pub async fn run_worker(&self, id: &str) -> Outcome {
        match self.registry.get_worker_by_id(id).await {
            Some(worker) => self.supervisor.execute(&worker).await,
            None => {
                warn!(worker = id, "run requested for unknown worker");
                Outcome::Bypassed(Bypass::Unregistered)
            }
        }
    }

    /// New stopped worker pool sized by `cfg.pool`, executing through the supervisor.
    pub fn worker_pool(&self) -> WorkerPool {
        let executor = self.supervisor.pool_executor(self.cfg.pool.attempt.clone());
        WorkerPool::new(&self.cfg.pool, executor, self.bus.clone())
    }

    /// Attaches `sub` for one event kind; the engine keeps the subscription alive.
    pub fn on(&self, kind: EventKind, sub: Arc<dyn Subscribe>) {
        self.keep(self.bus.on(kind, sub));
    }

    /// Attaches `sub` for every event; the engine keeps the subscription alive.
    pub fn on_any(&self, sub: Arc<dyn Subscribe>) {
        self.keep(self.bus.on_any(sub));
    }

    /// Saves every unit snapshot to `store`; returns how many were saved.
    pub async fn save_to(&self, store: &dyn StateStore) -> Result<usize, StoreError> {
        let units = self.registry.snapshot().await;
        store.save_state(&units).await?;
        Ok(units.len())
    }

    /// Restores saved state onto registered units; returns how many were applied.
    pub async fn restore_from(&self, store: &dyn StateStore) -> Result<usize, StoreError> {
        match store.load_state().await? {
            Some(units) => Ok(self.registry.restore(units).await),
            None => Ok(0),
        }
    }

    /// Cancels running attempts and detaches every engine-held subscriber.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown();
        let subs: Vec<Subscription> = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for sub in subs {
            sub.unsubscribe().await;
        }
        info!("engine shut down");
    }

    fn keep(&self, sub: Subscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::store::MemoryStore;
    use crate::units::{ActionFn, Process, UnitStatus, Worker};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ok(v: serde_json::Value) -> crate::units::ActionRef {
        ActionFn::arc(move |_ctx: CancellationToken| {
            let v = v.clone();
            async move { Ok::<_, TaskError>(v) }
        })
    }

    #[tokio::test]
    async fn unknown_and_disabled_processes_yield_empty_reports() {
        let engine = Engine::new(EngineConfig::default());
        assert_eq!(engine.run_process("nope").await, Ok(RunReport::new("nope")));

        engine
            .register(Process::new("off").with_enabled(false).with_worker(Worker::new("w", ok(json!(1)))))
            .await;
        let report = engine.run_process("off").await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(engine.registry().status_of("w").await, Some(UnitStatus::Idle));
    }

    #[tokio::test]
    async fn run_worker_bypasses_unknown_ids() {
        let engine = Engine::new(EngineConfig::default());
        assert_eq!(
            engine.run_worker("ghost").await,
            Outcome::Bypassed(Bypass::Unregistered)
        );
        engine.register(Worker::new("w", ok(json!("hi")))).await;
        assert_eq!(engine.run_worker("w").await, Outcome::Completed(json!("hi")));
    }

    #[tokio::test]
    async fn state_round_trips_through_a_store() {
        let engine = Engine::new(EngineConfig::default());
        engine
            .register(Process::new("p").with_worker(Worker::new("w", ok(json!(1)))))
            .await;
        engine.run_process("p").await.unwrap();
        let store = MemoryStore::new();
        assert_eq!(engine.save_to(&store).await.unwrap(), 2);

        let fresh = Engine::new(EngineConfig::default());
        fresh
            .register(Process::new("p").with_worker(Worker::new("w", ok(json!(1)))))
            .await;
        assert_eq!(fresh.restore_from(&store).await.unwrap(), 2);
        assert_eq!(fresh.registry().status_of("p").await, Some(UnitStatus::Completed));
        assert_eq!(
            fresh.registry().get_unit_by_id("w").await.unwrap().meta.run_count,
            1
        );
    }
}
