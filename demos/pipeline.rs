//! # Demo: latency pipeline
//!
//! - a graph process: `measure` → `fast_path` | `slow_path` (conditional)
//! - a batched process with one flaky member retried with exponential backoff
//! - a worker pool draining a small queue
//!
//! Run with `RUST_LOG=info cargo run --example pipeline`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use flowvisor::{
    ActionFn, ActionRef, BackoffPolicy, Dependency, Engine, EngineConfig, MemoryStore, Process,
    Render, RunMode, TaskError, UnitStatus, Worker,
};

struct Console;

impl Render for Console {
    fn render_unit_status(&self, unit_id: &str, status: UnitStatus, reason: Option<&str>) {
        match reason {
            Some(reason) => println!("  {unit_id:<12} {status} ({reason})"),
            None => println!("  {unit_id:<12} {status}"),
        }
    }

    fn render_milestone(&self, id: &str, payload: &Value) {
        println!("  * {id} {payload}");
    }
}

fn sleepy(ms: u64, out: Value) -> ActionRef {
    ActionFn::arc(move |ctx: CancellationToken| {
        let out = out.clone();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => Err(TaskError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(out),
            }
        }
    })
}

fn flaky(fail_times: u32) -> ActionRef {
    let calls = Arc::new(AtomicU32::new(0));
    ActionFn::arc(move |_ctx: CancellationToken| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n <= fail_times {
                Err(TaskError::fail(format!("upstream refused (call {n})")))
            } else {
                Ok(json!({ "calls": n }))
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = EngineConfig::default();
    let engine = Engine::builder(cfg.clone())
        .with_logging()
        .with_renderer(Console)
        .build();

    let latency = Process::with_defaults("latency", &cfg)
        .with_worker(Worker::with_defaults("measure", sleepy(50, json!({ "duration": 125 })), &cfg))
        .with_worker(
            Worker::with_defaults("fast_path", sleepy(10, json!("cached")), &cfg).depends_on(
                Dependency::when("measure", |r| r["duration"].as_u64() < Some(60)),
            ),
        )
        .with_worker(
            Worker::with_defaults("slow_path", sleepy(20, json!("rebuilt")), &cfg).depends_on(
                Dependency::when("measure", |r| r["duration"].as_u64() >= Some(60)),
            ),
        );

    let sync = Process::with_defaults("sync", &cfg)
        .with_run_mode(RunMode::Batched)
        .with_batch_size(2)
        .with_workers([
            Worker::with_defaults("users", sleepy(30, json!(120)), &cfg),
            Worker::with_defaults("orders", flaky(2), &cfg)
                .with_retries(3)
                .with_backoff(BackoffPolicy::exponential(Duration::from_millis(20), 2.0))
                .on_error(|id, err| eprintln!("{id} gave up: {err}")),
            Worker::with_defaults("invoices", sleepy(15, json!(7)), &cfg),
        ]);

    engine.register(latency).await;
    engine.register(sync).await;

    println!("latency:");
    let report = engine.run_process("latency").await?;
    println!("  => {}", serde_json::to_string(&report)?);

    println!("sync:");
    let report = engine.run_process("sync").await?;
    println!("  => {}", serde_json::to_string(&report)?);

    let pool = engine.worker_pool();
    for (i, ms) in [40u64, 10, 25, 5, 30].into_iter().enumerate() {
        pool.add_task(format!("job-{i}"), sleepy(ms, json!(ms)))?;
    }
    pool.start();
    while !pool.list_tasks().is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.stop();

    let store = MemoryStore::new();
    let saved = engine.save_to(&store).await?;
    println!("saved {saved} units: {}", store.json().unwrap_or_default());

    engine.shutdown().await;
    Ok(())
}
