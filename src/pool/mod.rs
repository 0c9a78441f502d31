//! # Worker pool: reusable execution slots fed by an ordered task queue.
//!
//! ```text
//! add_task(name, action) ──► queue (ordered by arrangement_id)
//!                                 │
//!          tick (every cfg.tick, or driven manually)
//!                                 │  head idle? slot idle?
//!                                 ▼
//!                   slot ◄── bind(task) ──► Executor(name, action)  (Supervisor attempt loop)
//!                     └──────── release: slot idle, binding cleared
//! ```
//!
//! - A paused task at the head of the queue blocks assignment (cascading pause)
//! - At most one task is assigned per tick
//! - Invalid operations return [`PoolError`] and leave the pool untouched

mod config;
mod core;
mod error;
mod slot;
mod task;

pub use self::core::{Executor, WorkerPool};
pub use config::PoolConfig;
pub use error::PoolError;
pub use slot::SlotStatus;
pub use task::{PoolTask, TaskPatch, TaskStatus};
