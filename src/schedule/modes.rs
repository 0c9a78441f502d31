//! # Run-mode executor for processes without explicit dependencies.
//!
//! | mode         | order                                   | failure of one worker        |
//! |--------------|-----------------------------------------|------------------------------|
//! | `Sequential` | one at a time, list order               | next worker still runs       |
//! | `Parallel`   | all at once                             | siblings unaffected          |
//! | `Isolated`   | one at a time, `isolation_delay` between | next worker still runs      |
//! | `Batched`    | chunks of `batch_size`, chunks in order | chunk and later chunks run   |
//!
//! Concurrent members are spawned into a [`JoinSet`]; every member is awaited
//! before the call returns.

use std::collections::HashMap;

use tokio::task::JoinSet;
use tokio::time;
use tracing::warn;

use crate::core::{Outcome, Supervisor};
use crate::error::TaskError;
use crate::schedule::RunReport;
use crate::units::{Process, RunMode, Worker};

pub(crate) async fn run_mode(sup: &Supervisor, process: &Process) -> RunReport {
    let mut report = RunReport::new(process.id());
    let workers = process.workers();

    match process.run_mode() {
        RunMode::Sequential => {
            for worker in workers {
                report.record(worker.id(), &sup.execute(worker).await);
            }
        }
        RunMode::Isolated => {
            for (idx, worker) in workers.iter().enumerate() {
                if idx > 0 && !pause(sup, process).await {
                    report.record(worker.id(), &Outcome::Failed(TaskError::Canceled));
                    continue;
                }
                report.record(worker.id(), &sup.execute(worker).await);
            }
        }
        RunMode::Parallel => run_chunk(sup, workers, &mut report).await,
        RunMode::Batched => {
            for chunk in workers.chunks(process.batch_size()) {
                run_chunk(sup, chunk, &mut report).await;
            }
        }
    }
    report
}

/// Sleeps `isolation_delay`; `false` if the supervisor shut down meanwhile.
async fn pause(sup: &Supervisor, process: &Process) -> bool {
    if sup.is_shut_down() {
        return false;
    }
    tokio::select! {
        _ = time::sleep(process.isolation_delay()) => true,
        _ = sup.cancelled() => false,
    }
}

async fn run_chunk(sup: &Supervisor, chunk: &[Worker], report: &mut RunReport) {
    let mut outcomes = run_concurrent(sup, chunk).await;
    for worker in chunk {
        let outcome = outcomes
            .remove(worker.id())
            .unwrap_or(Outcome::Failed(TaskError::Canceled));
        report.record(worker.id(), &outcome);
    }
}

/// Executes `workers` concurrently and waits for all of them.
///
/// A member whose task was aborted is missing from the map.
pub(crate) async fn run_concurrent(sup: &Supervisor, workers: &[Worker]) -> HashMap<String, Outcome> {
    let mut set = JoinSet::new();
    for worker in workers {
        let sup = sup.clone();
        let worker = worker.clone();
        set.spawn(async move {
            let outcome = sup.execute(&worker).await;
            (worker.id().to_owned(), outcome)
        });
    }

    let mut outcomes = HashMap::with_capacity(workers.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, outcome)) => {
                outcomes.insert(id, outcome);
            }
            Err(e) => warn!(error = %e, "worker task aborted"),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Registry;
    use crate::events::Bus;
    use crate::units::{ActionFn, ActionRef, UnitStatus};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    type Log = Arc<Mutex<Vec<(String, Duration)>>>;

    fn timed(id: &'static str, ms: u64, fail: bool, log: &Log, origin: Instant) -> Worker {
        let log = Arc::clone(log);
        let action: ActionRef = ActionFn::arc(move |_ctx: CancellationToken| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push((id.to_owned(), origin.elapsed()));
                time::sleep(Duration::from_millis(ms)).await;
                if fail {
                    Err(TaskError::fail("boom"))
                } else {
                    Ok(json!(ms))
                }
            }
        });
        Worker::new(id, action)
    }

    async fn run(process: Process) -> (Supervisor, RunReport) {
        let bus = Bus::new(256);
        let registry = Arc::new(Registry::new(bus.clone()));
        registry.register_unit(process.clone()).await;
        let sup = Supervisor::new(registry, bus);
        let report = run_mode(&sup, &process).await;
        (sup, report)
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_takes_the_longest_member() {
        let log = Log::default();
        let origin = Instant::now();
        let process = Process::new("p")
            .with_run_mode(RunMode::Parallel)
            .with_workers([
                timed("a", 100, false, &log, origin),
                timed("b", 300, true, &log, origin),
                timed("c", 200, false, &log, origin),
            ]);

        let (sup, report) = run(process).await;

        assert_eq!(origin.elapsed(), Duration::from_millis(300));
        assert_eq!(report.completed, vec!["a", "c"]);
        assert_eq!(report.failed, vec!["b"]);
        assert_eq!(sup.registry().status_of("p").await, Some(UnitStatus::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn isolated_waits_between_workers() {
        let log = Log::default();
        let origin = Instant::now();
        let process = Process::new("p")
            .with_run_mode(RunMode::Isolated)
            .with_isolation_delay(Duration::from_millis(50))
            .with_workers([
                timed("a", 10, false, &log, origin),
                timed("b", 10, true, &log, origin),
                timed("c", 10, false, &log, origin),
            ]);

        let (_, report) = run(process).await;

        let starts: Vec<_> = log.lock().unwrap().iter().map(|(_, at)| *at).collect();
        assert_eq!(
            starts,
            vec![
                Duration::ZERO,
                Duration::from_millis(60),
                Duration::from_millis(120)
            ]
        );
        assert_eq!(origin.elapsed(), Duration::from_millis(130));
        assert_eq!(report.failed, vec!["b"]);
        assert_eq!(report.completed, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_in_order_despite_failures() {
        let log = Log::default();
        let origin = Instant::now();
        let process = Process::new("p")
            .with_run_mode(RunMode::Batched)
            .with_batch_size(2)
            .with_workers([
                timed("a", 100, true, &log, origin),
                timed("b", 50, false, &log, origin),
                timed("c", 100, false, &log, origin),
                timed("d", 100, false, &log, origin),
                timed("e", 10, false, &log, origin),
            ]);

        let (_, report) = run(process).await;

        let starts: HashMap<String, Duration> = log.lock().unwrap().iter().cloned().collect();
        assert_eq!(starts["a"], Duration::ZERO);
        assert_eq!(starts["b"], Duration::ZERO);
        assert_eq!(starts["c"], Duration::from_millis(100));
        assert_eq!(starts["d"], Duration::from_millis(100));
        assert_eq!(starts["e"], Duration::from_millis(200));
        assert_eq!(report.failed, vec!["a"]);
        assert_eq!(report.completed, vec!["b", "c", "d", "e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_runs_in_list_order() {
        let log = Log::default();
        let origin = Instant::now();
        let process = Process::new("p").with_workers([
            timed("a", 30, false, &log, origin),
            timed("b", 20, false, &log, origin),
        ]);

        let (sup, report) = run(process).await;

        let order: Vec<String> = log.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(origin.elapsed(), Duration::from_millis(50));
        assert!(report.is_success());
        assert_eq!(sup.registry().status_of("p").await, Some(UnitStatus::Completed));
    }
}
