//! # Process scheduling.
//!
//! - [`graph`]: wave-based dependency scheduler (any worker declares `depends_on`)
//! - [`modes`]: run-mode executor (sequential / parallel / isolated / batched)
//! - [`RunReport`]: per-worker summary returned by both

mod graph;
mod modes;
mod report;

pub use graph::detect_cycle;
pub use report::RunReport;

pub(crate) use graph::run_graph;
pub(crate) use modes::run_mode;
