//! # Process: composite unit owning an ordered list of workers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::units::Worker;

/// Default pause between workers in [`RunMode::Isolated`].
pub const DEFAULT_ISOLATION_DELAY: Duration = Duration::from_millis(100);
/// Default chunk size in [`RunMode::Batched`].
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Concurrency strategy for a process without explicit dependencies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One worker at a time, in list order.
    #[default]
    Sequential,
    /// All workers at once, failures isolated.
    Parallel,
    /// Sequential with `isolation_delay` between consecutive workers.
    Isolated,
    /// Chunks of `batch_size`, chunks in order, members of a chunk concurrent.
    Batched,
}

/// Composite unit.
///
/// Adding a worker stamps it with the process id; the registry derives ownership
/// from this list only.
#[derive(Clone)]
pub struct Process {
    id: String,
    name: String,
    enabled: bool,
    workers: Vec<Worker>,
    run_mode: RunMode,
    isolation_delay: Duration,
    batch_size: usize,
}

impl Process {
    /// Empty sequential process named after `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            workers: Vec::new(),
            run_mode: RunMode::default(),
            isolation_delay: DEFAULT_ISOLATION_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Creates a process whose isolation delay and batch size come from the config.
    pub fn with_defaults(id: impl Into<String>, cfg: &EngineConfig) -> Self {
        Self::new(id)
            .with_isolation_delay(cfg.isolation_delay)
            .with_batch_size(cfg.batch_size)
    }

    /// Unique unit id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name (defaults to the id).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disabled processes are never run.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Member workers in declaration order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Run mode used when no member declares `depends_on`.
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Pause between workers in [`RunMode::Isolated`].
    pub fn isolation_delay(&self) -> Duration {
        self.isolation_delay
    }

    /// Chunk size, never below 1.
    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// True when at least one member declares `depends_on`.
    pub fn has_dependencies(&self) -> bool {
        self.workers.iter().any(|w| !w.dependencies().is_empty())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Appends a worker; a worker with an id already in the list replaces it in place.
    pub fn with_worker(mut self, mut worker: Worker) -> Self {
        worker.set_process_id(Some(self.id.clone()));
        match self.workers.iter_mut().find(|w| w.id() == worker.id()) {
            Some(existing) => *existing = worker,
            None => self.workers.push(worker),
        }
        self
    }

    pub fn with_workers(self, workers: impl IntoIterator<Item = Worker>) -> Self {
        workers.into_iter().fold(self, Process::with_worker)
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn with_isolation_delay(mut self, delay: Duration) -> Self {
        self.isolation_delay = delay;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Splits the process into its settings (no workers) and its member list.
    pub(crate) fn into_parts(mut self) -> (Process, Vec<Worker>) {
        let workers = std::mem::take(&mut self.workers);
        (self, workers)
    }

    /// Rebuilds a process from settings and members, as returned by the registry.
    pub(crate) fn from_parts(mut settings: Process, workers: Vec<Worker>) -> Process {
        settings.workers = workers;
        settings
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("run_mode", &self.run_mode)
            .field("isolation_delay", &self.isolation_delay)
            .field("batch_size", &self.batch_size)
            .field(
                "workers",
                &self.workers.iter().map(Worker::id).collect::<Vec<_>>(),
            )
            .finish()
    }
}
