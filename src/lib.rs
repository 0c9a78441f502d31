//! # flowvisor
//!
//! **Flowvisor** is an in-process workflow engine for tokio applications.
//!
//! Callers register units of work, either single [`Worker`]s or [`Process`]es that
//! group workers, and the engine decides *when*, *in what order* and *with what fault
//! tolerance* each action runs.
//!
//! ## Architecture
//! ```text
//!                     ┌───────────────────────────────┐
//!   register(unit) ──►│ Registry (RwLock, IndexMap)   │◄── update_unit_state / snapshot / restore
//!                     │  status · metrics · results   │
//!                     │  aggregate(process) on change │
//!                     └──────────────┬────────────────┘
//!                                    │ events (after lock release)
//!   run_process(id)                  ▼
//!     ├─ depends_on? ─► graph waves ─┐     ┌──────────────────────────────┐
//!     └─ run mode ────► seq/par/iso/batch ─►│ Supervisor::execute(worker)  │
//!                                          │  attempts · timeout · backoff │
//!   WorkerPool ─ tick ─► slot ─► Executor ─►│  run_attempts(...)           │
//!                                          └──────────────┬───────────────┘
//!                                                         ▼
//!                              ┌──────────────────── Bus (broadcast) ───────────────┐
//!                              ▼                  ▼                 ▼                ▼
//!                         LogWriter      RenderSubscriber     SubscribeFn      raw Receiver
//! ```
//!
//! ## Features
//! | Area             | Description                                               | Key types                                   |
//! |------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Units**        | Workers, processes, dependencies with conditions          | [`Worker`], [`Process`], [`Dependency`]     |
//! | **Scheduling**   | Dependency waves and run modes                            | [`RunMode`], [`RunReport`]                  |
//! | **Supervision**  | Retries, timeouts, backoff with jitter                    | [`Supervisor`], [`BackoffPolicy`]           |
//! | **Registry**     | Status propagation, metrics, snapshots                    | [`Registry`], [`UnitSnapshot`]              |
//! | **Pool**         | Slots fed by an ordered queue                             | [`WorkerPool`], [`PoolConfig`]              |
//! | **Events**       | Status events, milestones, subscriptions                  | [`Bus`], [`Subscribe`], [`Milestones`]      |
//! | **Persistence**  | Pluggable snapshot store                                  | [`StateStore`], [`MemoryStore`]             |
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use flowvisor::{ActionFn, Dependency, Engine, EngineConfig, Process, TaskError, Worker};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(EngineConfig::default()).with_logging().build();
//!
//!     let measure = ActionFn::arc(|_ctx: CancellationToken| async {
//!         Ok::<_, TaskError>(json!({ "duration": 125 }))
//!     });
//!     let report = ActionFn::arc(|_ctx: CancellationToken| async {
//!         Ok::<_, TaskError>(json!("slow path"))
//!     });
//!
//!     engine
//!         .register(
//!             Process::new("latency")
//!                 .with_worker(Worker::new("measure", measure))
//!                 .with_worker(Worker::new("report", report).depends_on(Dependency::when(
//!                     "measure",
//!                     |r| r["duration"].as_u64() >= Some(60),
//!                 ))),
//!         )
//!         .await;
//!
//!     let run = engine.run_process("latency").await?;
//!     assert_eq!(run.completed, vec!["measure", "report"]);
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policies;
mod pool;
mod schedule;
mod store;
mod subscribers;
mod units;

// ---- Public re-exports ----

pub use config::EngineConfig;
pub use core::{Bypass, Engine, EngineBuilder, Outcome, Registry, Supervisor, UnitPatch};
pub use error::{EngineError, TaskError};
pub use events::{Bus, Event, EventKind, Milestones};
pub use policies::{AttemptPolicy, BackoffPolicy, DelayFn, JitterPolicy, DEFAULT_TIMEOUT};
pub use pool::{Executor, PoolConfig, PoolError, PoolTask, SlotStatus, TaskPatch, TaskStatus, WorkerPool};
pub use schedule::{detect_cycle, RunReport};
pub use store::{MemoryStore, StateStore, StoreError};
pub use subscribers::{
    EventFilter, LogWriter, Render, RenderSubscriber, Subscribe, SubscribeFn, Subscription,
};
pub use units::{
    Action, ActionFn, ActionFuture, ActionRef, Condition, Dependency, ErrorHook, Process, RunMode,
    Unit, UnitKind, UnitMetrics, UnitSnapshot, UnitStatus, Worker, DEFAULT_BATCH_SIZE,
    DEFAULT_ISOLATION_DELAY,
};
