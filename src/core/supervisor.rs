//! # Supervisor: the single execution primitive.
//!
//! Every worker invocation, whether it comes from a run mode, the dependency graph or
//! the worker pool, goes through the [`Supervisor`]. It wraps one action with
//! bounded attempts and a bounded per-attempt duration.
//!
//! ## Flow of [`Supervisor::execute`]
//! ```text
//! registry.begin_run(id) ──► Err(Bypass) ──► Outcome::Bypassed   (no state change)
//!        │ Ok (status = running)
//!        ▼
//! loop attempt = 1..=max_retries+1
//!   ├─► run_once(action, child token, timeout)
//!   │     ├─ Ok(value)              → completed (result recorded) → Outcome::Completed
//!   │     └─ Err(e)
//!   │          ├─ attempts left && e.is_retryable()
//!   │          │     → publish BackoffScheduled → sleep(backoff.delay(attempt))
//!   │          └─ otherwise → error (message recorded) → error hook → Outcome::Failed
//! ```
//!
//! ## Rules
//! - Attempts of one invocation run **sequentially**
//! - `Fatal` and `Canceled` end the loop immediately
//! - Shutdown cancels the running attempt and aborts any backoff sleep; the
//!   worker goes back to `idle`
//! - A panicking error hook is logged and ignored
//! - A panicking backoff policy ends the loop with `Fatal`; the worker goes to `error`

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::{select, time};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use crate::core::registry::{Registry, UnitPatch};
use crate::core::runner::{panic_message, run_once};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::AttemptPolicy;
use crate::pool::Executor;
use crate::units::{ActionRef, UnitStatus, Worker};

/// Reason a worker invocation was not executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bypass {
    Paused,
    AlreadyCompleted,
    AlreadyRunning,
    Disabled,
    Unregistered,
}

impl Bypass {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Bypass::Paused => "paused",
            Bypass::AlreadyCompleted => "already_completed",
            Bypass::AlreadyRunning => "already_running",
            Bypass::Disabled => "disabled",
            Bypass::Unregistered => "unregistered",
        }
    }
}

/// Result of one [`Supervisor::execute`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed(Value),
    Failed(TaskError),
    Bypassed(Bypass),
}

impl Outcome {
    /// True for [`Outcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

/// Executes workers against the registry; cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    registry: Arc<Registry>,
    bus: Bus,
    token: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor recording into `registry` and publishing on `bus`.
    ///
    /// ### Rules
    /// - Clones share one shutdown token
    /// - The registry must hold every worker passed to [`Supervisor::execute`]
    pub fn new(registry: Arc<Registry>, bus: Bus) -> Self {
        Self {
            registry,
            bus,
            token: CancellationToken::new(),
        }
    }

    /// Registry receiving status transitions.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Bus carrying attempt and backoff events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs `worker` once (with retries) and records the terminal status.
    pub async fn execute(&self, worker: &Worker) -> Outcome {
        let id = worker.id();
        if let Err(bypass) = self.registry.begin_run(id).await {
            debug!(worker = id, reason = bypass.as_label(), "worker bypassed");
            return Outcome::Bypassed(bypass);
        }

        match self.run_attempts(id, worker.action(), worker.policy()).await {
            Ok(value) => {
                self.registry
                    .update_unit_state(
                        id,
                        UnitPatch::status(UnitStatus::Completed).with_result(value.clone()),
                    )
                    .await;
                Outcome::Completed(value)
            }
            Err(TaskError::Canceled) => {
                self.registry
                    .update_unit_state(id, UnitPatch::status(UnitStatus::Idle))
                    .await;
                Outcome::Failed(TaskError::Canceled)
            }
            Err(err) => {
                self.registry
                    .update_unit_state(
                        id,
                        UnitPatch::status(UnitStatus::Error).with_error(err.to_string()),
                    )
                    .await;
                if let Some(hook) = worker.error_hook() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(id, &err))) {
                        warn!(
                            worker = id,
                            info = %panic_message(panic.as_ref()),
                            "error hook panicked"
                        );
                    }
                }
                Outcome::Failed(err)
            }
        }
    }

    /// Attempt loop without registry bookkeeping.
    pub async fn run_attempts(
        &self,
        unit: &str,
        action: &ActionRef,
        policy: &AttemptPolicy,
    ) -> Result<Value, TaskError> {
        let attempts = policy.attempts();
        let timeout = policy.effective_timeout();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match run_once(action.as_ref(), unit, &self.token, timeout, attempt, &self.bus)
                .await
            {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = match catch_unwind(AssertUnwindSafe(|| policy.backoff.delay(attempt))) {
                Ok(delay) => delay,
                Err(panic) => {
                    let info = panic_message(panic.as_ref());
                    warn!(unit, attempt, info = %info, "backoff policy panicked");
                    return Err(TaskError::fatal(format!("backoff policy panicked: {info}")));
                }
            };
            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_unit(unit)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_reason(err.to_string()),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = self.token.cancelled() => return Err(TaskError::Canceled),
            }
        }
    }

    /// Executor callback for the worker pool, running tasks under `policy`.
    pub fn pool_executor(&self, policy: AttemptPolicy) -> Executor {
        let sup = self.clone();
        Arc::new(move |name: String, action: ActionRef| {
            let sup = sup.clone();
            let policy = policy.clone();
            async move { sup.run_attempts(&name, &action, &policy).await }.boxed()
        })
    }

    /// Cancels running attempts and backoff sleeps; later runs fail with `Canceled`.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// True once [`Supervisor::shutdown`] was called.
    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
