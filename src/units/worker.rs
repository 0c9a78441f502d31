//! # Worker: leaf unit wrapping one action.
//!
//! A worker bundles:
//! - the [`ActionRef`] to execute
//! - an [`AttemptPolicy`] (timeout, retries, backoff)
//! - its `depends_on` list (ordered, deduplicated by id)
//! - an optional error hook called after the final failed attempt
//!
//! It can be created explicitly with [`Worker::new`] (built-in defaults) or from
//! config with [`Worker::with_defaults`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::policies::{AttemptPolicy, BackoffPolicy};
use crate::units::{ActionRef, Dependency};

/// Callback invoked with the worker id and the terminal error.
pub type ErrorHook = Arc<dyn Fn(&str, &TaskError) + Send + Sync>;

/// Leaf unit.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use serde_json::json;
/// use tokio_util::sync::CancellationToken;
/// use flowvisor::{ActionFn, BackoffPolicy, Dependency, TaskError, Worker};
///
/// let fetch = Worker::new("fetch", ActionFn::arc(|_ctx: CancellationToken| async {
///     Ok::<_, TaskError>(json!({ "rows": 10 }))
/// }))
/// .with_timeout(Duration::from_secs(2))
/// .with_retries(3)
/// .with_backoff(BackoffPolicy::exponential(Duration::from_millis(50), 2.0))
/// .depends_on(Dependency::on("login"));
///
/// assert_eq!(fetch.policy().attempts(), 4);
/// ```
#[derive(Clone)]
pub struct Worker {
    id: String,
    name: String,
    enabled: bool,
    action: ActionRef,
    policy: AttemptPolicy,
    depends_on: Vec<Dependency>,
    process_id: Option<String>,
    on_error: Option<ErrorHook>,
}

impl Worker {
    /// Creates a worker with built-in defaults (10s timeout, no retries).
    pub fn new(id: impl Into<String>, action: ActionRef) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            action,
            policy: AttemptPolicy::default(),
            depends_on: Vec::new(),
            process_id: None,
            on_error: None,
        }
    }

    /// Creates a worker inheriting the attempt policy from the engine config.
    pub fn with_defaults(id: impl Into<String>, action: ActionRef, cfg: &EngineConfig) -> Self {
        Self::new(id, action).with_policy(cfg.attempt_policy())
    }

    /// Stable id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name (defaults to the id).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the supervisor may run this worker.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Action executed per attempt.
    pub fn action(&self) -> &ActionRef {
        &self.action
    }

    /// Attempt policy.
    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    /// Dependencies in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.depends_on
    }

    /// Owning process id (index only; the process member list is authoritative).
    pub fn process_id(&self) -> Option<&str> {
        self.process_id.as_deref()
    }

    /// Error hook, if any.
    pub fn error_hook(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_policy(mut self, policy: AttemptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the per-attempt timeout; `Duration::ZERO` disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Adds a dependency; a second entry for the same id replaces the first.
    pub fn depends_on(mut self, dep: impl Into<Dependency>) -> Self {
        let dep = dep.into();
        match self.depends_on.iter_mut().find(|d| d.id() == dep.id()) {
            Some(existing) => *existing = dep,
            None => self.depends_on.push(dep),
        }
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&str, &TaskError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn set_process_id(&mut self, process_id: Option<String>) {
        self.process_id = process_id;
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .field("depends_on", &self.depends_on)
            .field("process_id", &self.process_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ActionFn;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    fn noop() -> ActionRef {
        ActionFn::arc(|_ctx: CancellationToken| async { Ok::<_, TaskError>(Value::Null) })
    }

    #[test]
    fn dependencies_are_an_ordered_set() {
        let w = Worker::new("c", noop())
            .depends_on("a")
            .depends_on("b")
            .depends_on(Dependency::when("a", |_| false));
        let ids: Vec<&str> = w.dependencies().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(w.dependencies()[0].is_conditional());
    }

    #[test]
    fn inherits_config_policy() {
        let mut cfg = EngineConfig::default();
        cfg.max_retries = 2;
        cfg.timeout = Duration::ZERO;
        let w = Worker::with_defaults("w", noop(), &cfg);
        assert_eq!(w.policy().attempts(), 3);
        assert_eq!(w.policy().effective_timeout(), None);
        assert_eq!(w.name(), "w");
    }
}
