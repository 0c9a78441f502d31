//! # Dependency graph scheduler.
//!
//! Active for a process as soon as one of its workers declares `depends_on`.
//!
//! ```text
//! detect_cycle(workers)            ── cycle ──► Err(CycleDetected), nothing runs
//!        │
//!        ▼
//! seed: workers already completed in the registry
//! loop (wave):
//!   for each open worker:
//!     ├─ a dependency condition is false      → skipped (permanent)
//!     ├─ every dependency completed (+ true)   → ready
//!     └─ otherwise                             → waits
//!   no ready worker → stop (remaining workers are pending)
//!   run ready workers concurrently, record results by id
//!   a failed worker → Err(WorkerFailed), dependents never run
//! ```
//!
//! Dependencies on ids outside the process are satisfied through the registry
//! (status `completed`, stored result). A condition that panics counts as not met.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{panic_message, Bypass, Outcome, Supervisor};
use crate::error::{EngineError, TaskError};
use crate::schedule::modes::run_concurrent;
use crate::schedule::RunReport;
use crate::units::{UnitStatus, Worker};

/// Depth-first search with path tracking over the process-local dependency edges.
///
/// Returns the first cycle found, starting and ending with the revisited worker.
pub fn detect_cycle(workers: &[Worker]) -> Result<(), EngineError> {
    let index: HashMap<&str, &Worker> = workers.iter().map(|w| (w.id(), w)).collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();
    for worker in workers {
        visit(worker.id(), &index, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    index: &HashMap<&'a str, &'a Worker>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), EngineError> {
    if done.contains(id) {
        return Ok(());
    }
    if let Some(pos) = path.iter().position(|p| *p == id) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|p| (*p).to_owned()).collect();
        cycle.push(id.to_owned());
        return Err(EngineError::CycleDetected {
            id: id.to_owned(),
            path: cycle,
        });
    }
    let Some(worker) = index.get(id).copied() else {
        return Ok(());
    };
    path.push(id);
    for dep in worker.dependencies() {
        visit(dep.id(), index, path, done)?;
    }
    path.pop();
    done.insert(id);
    Ok(())
}

enum Readiness {
    Ready,
    Waiting,
    Skip(String),
}

/// Executes `workers` of `process_id` in dependency waves.
pub(crate) async fn run_graph(
    sup: &Supervisor,
    process_id: &str,
    workers: &[Worker],
) -> Result<RunReport, EngineError> {
    detect_cycle(workers)?;

    let registry = sup.registry();
    let local: HashSet<&str> = workers.iter().map(Worker::id).collect();
    let mut results: HashMap<String, Value> = HashMap::new();
    let mut skipped: HashSet<String> = HashSet::new();

    for worker in workers {
        if registry.status_of(worker.id()).await == Some(UnitStatus::Completed) {
            let result = registry.result_of(worker.id()).await.unwrap_or(Value::Null);
            results.insert(worker.id().to_owned(), result);
        }
    }

    let mut wave_no = 0usize;
    loop {
        let mut wave: Vec<Worker> = Vec::new();
        for worker in workers {
            let id = worker.id();
            if results.contains_key(id) || skipped.contains(id) {
                continue;
            }
            match readiness(sup, worker, &local, &results).await {
                Readiness::Ready => wave.push(worker.clone()),
                Readiness::Waiting => {}
                Readiness::Skip(reason) => {
                    registry.mark_skipped(id, &reason).await;
                    skipped.insert(id.to_owned());
                }
            }
        }
        if wave.is_empty() {
            break;
        }

        wave_no += 1;
        debug!(process = process_id, wave = wave_no, size = wave.len(), "running wave");
        let mut outcomes = run_concurrent(sup, &wave).await;
        let mut failure: Option<(String, TaskError)> = None;
        for worker in &wave {
            let id = worker.id();
            match outcomes.remove(id).unwrap_or(Outcome::Failed(TaskError::Canceled)) {
                Outcome::Completed(value) => {
                    results.insert(id.to_owned(), value);
                }
                Outcome::Bypassed(Bypass::AlreadyCompleted) => {
                    let value = registry.result_of(id).await.unwrap_or(Value::Null);
                    results.insert(id.to_owned(), value);
                }
                Outcome::Bypassed(bypass) => {
                    registry.mark_skipped(id, bypass.as_label()).await;
                    skipped.insert(id.to_owned());
                }
                Outcome::Failed(error) => {
                    if failure.is_none() {
                        failure = Some((id.to_owned(), error));
                    }
                }
            }
        }
        if let Some((id, error)) = failure {
            return Err(EngineError::WorkerFailed { id, error });
        }
    }

    let mut report = RunReport::new(process_id);
    for worker in workers {
        let id = worker.id().to_owned();
        if results.contains_key(&id) {
            report.completed.push(id);
        } else if skipped.contains(&id) {
            report.skipped.push(id);
        } else {
            report.pending.push(id);
        }
    }
    Ok(report)
}

async fn readiness(
    sup: &Supervisor,
    worker: &Worker,
    local: &HashSet<&str>,
    results: &HashMap<String, Value>,
) -> Readiness {
    let mut ready = true;
    for dep in worker.dependencies() {
        let result = if local.contains(dep.id()) {
            results.get(dep.id()).cloned()
        } else if sup.registry().status_of(dep.id()).await == Some(UnitStatus::Completed) {
            Some(sup.registry().result_of(dep.id()).await.unwrap_or(Value::Null))
        } else {
            None
        };
        let Some(value) = result else {
            ready = false;
            continue;
        };
        match catch_unwind(AssertUnwindSafe(|| dep.evaluate(Some(&value)))) {
            Ok(true) => {}
            Ok(false) => {
                return Readiness::Skip(format!("condition on {} not met", dep.id()));
            }
            Err(panic) => {
                let info = panic_message(panic.as_ref());
                warn!(
                    worker = worker.id(),
                    dependency = dep.id(),
                    info = %info,
                    "condition panicked"
                );
                return Readiness::Skip(format!("condition on {} panicked: {info}", dep.id()));
            }
        }
    }
    if ready {
        Readiness::Ready
    } else {
        Readiness::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Registry;
    use crate::events::Bus;
    use crate::units::{ActionFn, ActionRef, Dependency, Process};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Log = Arc<Mutex<Vec<String>>>;

    fn step(id: &'static str, out: Value, log: &Log) -> Worker {
        let log = Arc::clone(log);
        let action: ActionRef = ActionFn::arc(move |_ctx: CancellationToken| {
            let log = Arc::clone(&log);
            let out = out.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                log.lock().unwrap().push(id.to_owned());
                Ok(out)
            }
        });
        Worker::new(id, action)
    }

    fn failing(id: &'static str, log: &Log) -> Worker {
        let log = Arc::clone(log);
        Worker::new(
            id,
            ActionFn::arc(move |_ctx: CancellationToken| {
                log.lock().unwrap().push(id.to_owned());
                async { Err(TaskError::fail("down")) }
            }),
        )
    }

    async fn supervisor(process: &Process) -> Supervisor {
        let bus = Bus::new(256);
        let registry = Arc::new(Registry::new(bus.clone()));
        registry.register_unit(process.clone()).await;
        Supervisor::new(registry, bus)
    }

    #[test]
    fn finds_three_node_cycle() {
        let log = Log::default();
        let workers = vec![
            step("a", Value::Null, &log).depends_on("c"),
            step("b", Value::Null, &log).depends_on("a"),
            step("c", Value::Null, &log).depends_on("b"),
        ];
        match detect_cycle(&workers) {
            Err(EngineError::CycleDetected { id, path }) => {
                assert_eq!(id, "a");
                assert_eq!(path, vec!["a", "c", "b", "a"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn diamond_is_acyclic_and_self_loop_is_not() {
        let log = Log::default();
        let diamond = vec![
            step("a", Value::Null, &log),
            step("b", Value::Null, &log).depends_on("a"),
            step("c", Value::Null, &log).depends_on("a"),
            step("d", Value::Null, &log).depends_on("b").depends_on("c"),
        ];
        assert!(detect_cycle(&diamond).is_ok());
        assert!(detect_cycle(&[step("s", Value::Null, &log).depends_on("s")]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_fails_before_any_execution() {
        let log = Log::default();
        let process = Process::new("p").with_workers([
            step("a", Value::Null, &log).depends_on("c"),
            step("b", Value::Null, &log).depends_on("a"),
            step("c", Value::Null, &log).depends_on("b"),
        ]);
        let sup = supervisor(&process).await;

        let err = run_graph(&sup, "p", process.workers()).await.unwrap_err();
        assert_eq!(err.as_label(), "engine_cycle_detected");
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sup.registry().status_of("a").await, Some(UnitStatus::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn dependencies_complete_before_dependents_start() {
        let log = Log::default();
        let process = Process::new("p").with_workers([
            step("d", json!(4), &log).depends_on("b").depends_on("c"),
            step("b", json!(2), &log).depends_on("a"),
            step("c", json!(3), &log).depends_on("a"),
            step("a", json!(1), &log),
        ]);
        let sup = supervisor(&process).await;

        let report = run_graph(&sup, "p", process.workers()).await.unwrap();

        let order = log.lock().unwrap().clone();
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
        assert_eq!(report.completed, vec!["d", "b", "c", "a"]);
        assert_eq!(sup.registry().status_of("p").await, Some(UnitStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn false_condition_skips_and_leaves_dependents_pending() {
        let log = Log::default();
        let process = Process::new("p").with_workers([
            step("a", json!({ "duration": 125 }), &log),
            step("b", Value::Null, &log)
                .depends_on(Dependency::when("a", |r| r["duration"].as_i64() < Some(60))),
            step("c", Value::Null, &log).depends_on("b"),
        ]);
        let sup = supervisor(&process).await;

        let report = run_graph(&sup, "p", process.workers()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(report.completed, vec!["a"]);
        assert_eq!(report.skipped, vec!["b"]);
        assert_eq!(report.pending, vec!["c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_blocks_transitive_dependents() {
        let log = Log::default();
        let process = Process::new("p").with_workers([
            failing("a", &log),
            step("b", Value::Null, &log).depends_on("a"),
            step("c", Value::Null, &log).depends_on("b"),
            step("solo", Value::Null, &log),
        ]);
        let sup = supervisor(&process).await;

        let err = run_graph(&sup, "p", process.workers()).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::WorkerFailed {
                id: "a".into(),
                error: TaskError::fail("down"),
            }
        );
        let ran = log.lock().unwrap().clone();
        assert!(!ran.contains(&"b".to_string()) && !ran.contains(&"c".to_string()));
        assert_eq!(sup.registry().status_of("b").await, Some(UnitStatus::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn external_dependency_uses_registry() {
        let log = Log::default();
        let process = Process::new("p")
            .with_worker(step("x", Value::Null, &log).depends_on("outside"));
        let sup = supervisor(&process).await;
        sup.registry()
            .register_unit(step("outside", json!(true), &log))
            .await;

        let report = run_graph(&sup, "p", process.workers()).await.unwrap();
        assert_eq!(report.pending, vec!["x"]);

        let outside = sup.registry().get_worker_by_id("outside").await.unwrap();
        sup.execute(&outside).await;
        let report = run_graph(&sup, "p", process.workers()).await.unwrap();
        assert_eq!(report.completed, vec!["x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_condition_skips_the_dependent() {
        let log = Log::default();
        let process = Process::new("p").with_workers([
            step("a", json!(1), &log),
            step("b", Value::Null, &log).depends_on(Dependency::when("a", |_| panic!("boom"))),
            step("c", Value::Null, &log),
        ]);
        let sup = supervisor(&process).await;

        let report = run_graph(&sup, "p", process.workers()).await.unwrap();

        assert_eq!(report.completed, vec!["a", "c"]);
        assert_eq!(report.skipped, vec!["b"]);
        assert!(!log.lock().unwrap().contains(&"b".to_string()));
        assert_eq!(sup.registry().status_of("b").await, Some(UnitStatus::Idle));
    }
}
