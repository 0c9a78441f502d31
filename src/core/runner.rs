//! # Run a single attempt of an action.
//!
//! Executes one attempt of an [`Action`] with an optional timeout and publishes
//! attempt events to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   action.call() → Ok(value)                    (no event, caller records completion)
//!
//! Failure / panic:
//!   action.call() → Err(Fail/Fatal) | panic → publish AttemptFailed
//!
//! Timeout:
//!   timeout exceeded → cancel child → publish TimeoutHit
//!                                   → publish AttemptFailed (timeout)
//!
//! Shutdown:
//!   parent token cancelled → cancel child → publish AttemptFailed (canceled)
//! ```
//!
//! ## Rules
//! - Derives a **child token** per attempt; cancelling it never affects the parent
//! - The attempt future is dropped on timeout; only work the action spawned on its
//!   own outlives it, and such work must watch the token
//! - A panic inside the action becomes `TaskError::Fail`

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::units::Action;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Executes attempt number `attempt` of `action` on behalf of `unit`.
pub(crate) async fn run_once(
    action: &dyn Action,
    unit: &str,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    attempt: u32,
    bus: &Bus,
) -> Result<Value, TaskError> {
    let child = parent.child_token();
    let guarded = async {
        tokio::select! {
            biased;
            _ = parent.cancelled() => Err(TaskError::Canceled),
            res = AssertUnwindSafe(action.call(child.clone())).catch_unwind() => match res {
                Ok(r) => r,
                Err(panic) => Err(TaskError::fail(format!(
                    "action panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            },
        }
    };

    let res = match timeout {
        Some(dur) => match time::timeout(dur, guarded).await {
            Ok(r) => r,
            Err(_elapsed) => {
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_unit(unit)
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                Err(TaskError::Timeout { timeout: dur })
            }
        },
        None => guarded.await,
    };

    if let Err(e) = &res {
        child.cancel();
        bus.publish(
            Event::new(EventKind::AttemptFailed)
                .with_unit(unit)
                .with_attempt(attempt)
                .with_reason(e.to_string()),
        );
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ActionFn;
    use serde_json::json;

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_child_and_reports() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let parent = CancellationToken::new();
        let action = ActionFn::new(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok(json!("late"))
        });

        let res = run_once(&action, "slow", &parent, Some(Duration::from_millis(50)), 1, &bus).await;

        assert_eq!(
            res,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(50)
            })
        );
        assert!(!parent.is_cancelled());
        assert_eq!(drain(&mut rx), vec![EventKind::TimeoutHit, EventKind::AttemptFailed]);
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        let action = ActionFn::new(|_ctx: CancellationToken| async move {
            if true {
                panic!("kaboom");
            }
            Ok(Value::Null)
        });

        let err = run_once(&action, "p", &parent, None, 1, &bus)
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert!(err.to_string().contains("kaboom"));
    }

    #[tokio::test]
    async fn cancelled_parent_short_circuits() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        parent.cancel();
        let action = ActionFn::new(|_ctx: CancellationToken| async { Ok(json!(1)) });

        let res = run_once(&action, "c", &parent, None, 1, &bus).await;
        assert_eq!(res, Err(TaskError::Canceled));
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
