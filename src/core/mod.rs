//! Runtime core: registry, supervision and the engine surface.
//!
//! - [`registry`]: unit store with reactive status propagation;
//! - [`runner`]: executes one attempt with timeout/cancellation and event publishing;
//! - [`supervisor`]: attempt loop, bypass rules and terminal status recording;
//! - [`engine`]: routes process runs to the graph scheduler or the run-mode executor;
//! - [`builder`]: wires subscribers before the engine starts publishing.

mod builder;
mod engine;
mod registry;
mod runner;
mod supervisor;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use registry::{Registry, UnitPatch};
pub use supervisor::{Bypass, Outcome, Supervisor};

pub(crate) use runner::panic_message;
