//! Test harness shared by the `queueless` integration tests: a way to spin
//! up real workers against a `#[sqlx::test]`-provided ephemeral Postgres
//! database, plus a couple of small [`Executor`] impls standing in for a
//! real payload carrier and executor.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use queueless_core::{Config, Database, Executor};
use queueless_worker::{Worker, WorkerBuilder, WorkerExit, WorkerHandle};
use tokio::task::JoinHandle;

/// `f(param="abc") = len(param) + 42`.
pub fn len_plus(kwargs: &serde_json::Value) -> Result<serde_json::Value, String> {
    let param = kwargs["param"].as_str().ok_or("missing param")?;
    Ok(serde_json::json!(param.len() as i64 + 42))
}

/// An [`Executor`] whose `call` never returns until explicitly released,
/// standing in for a payload that hangs forever without actually blocking
/// the test runtime the way a real `sleep()` payload would.
pub struct HangingExecutor {
    release: tokio::sync::Notify,
    calls: AtomicUsize,
}

impl HangingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            release: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Let every in-flight and future `call` return.
    pub fn release(&self) {
        self.release.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for HangingExecutor {
    async fn call(&self, _function: &[u8], _kwargs: &[u8]) -> Result<Vec<u8>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(b"null".to_vec())
    }
}

/// Spawn a registered worker against `db` and return a guard that requests
/// shutdown when dropped.
pub async fn spawn_worker(
    db: Database,
    executor: Arc<dyn Executor>,
    tag: impl Into<String>,
) -> WorkerGuard {
    spawn_worker_with_config(db, executor, tag, Config::default()).await
}

pub async fn spawn_worker_with_config(
    db: Database,
    executor: Arc<dyn Executor>,
    tag: impl Into<String>,
    config: Config,
) -> WorkerGuard {
    let worker = WorkerBuilder::new(db, executor)
        .config(config)
        .tag(tag)
        .build();

    spawn_from_worker(worker)
}

fn spawn_from_worker(mut worker: Worker) -> WorkerGuard {
    let handle = worker.handle();
    let task = tokio::spawn(async move { worker.run().await });

    WorkerGuard { handle, task }
}

/// A running worker plus a shutdown handle; dropping it requests a
/// graceful stop without waiting for the loop to actually exit — await the
/// guard itself (or call `shutdown()`) for that.
pub struct WorkerGuard {
    handle: WorkerHandle,
    task: JoinHandle<anyhow::Result<WorkerExit>>,
}

impl WorkerGuard {
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Request a stop and wait for the loop to actually exit.
    pub async fn shutdown(self) -> anyhow::Result<WorkerExit> {
        self.handle.shutdown();
        self.await
    }

    /// Abort the worker's tokio task immediately, without running any of
    /// its own shutdown path. Stands in for a worker process crashing: its
    /// row is left behind in `workers` with whatever heartbeat it last
    /// wrote, for the cleanup sweep to notice.
    pub fn abort(self) {
        self.task.abort();
    }
}

impl Future for WorkerGuard {
    type Output = anyhow::Result<WorkerExit>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = std::task::ready!(self.task.poll_unpin(cx));

        Poll::Ready(match result {
            Ok(result) => result,
            Err(e) => match e.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(e) => Err(anyhow::anyhow!(e)),
            },
        })
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

/// Poll until `deadline` elapses or `f` returns `Some`, sleeping `interval`
/// between attempts. Used throughout the end-to-end tests in place of a
/// "wait for completion" primitive — the core deliberately has none;
/// clients poll.
pub async fn poll_until<T, F, Fut>(deadline: Duration, interval: Duration, mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    let start = tokio::time::Instant::now();
    loop {
        if let Some(value) = f().await.ok().flatten() {
            return Some(value);
        }
        if start.elapsed() >= deadline {
            return None;
        }
        tokio::time::sleep(interval).await;
    }
}

/// The id of the most recently registered worker row. Used by tests that
/// need to act as the database administrator and remove a worker's row.
pub async fn most_recent_worker_id(db: &Database) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query_scalar("SELECT id FROM workers ORDER BY id DESC LIMIT 1")
        .fetch_one(db.pool())
        .await?;
    Ok(id)
}

/// Whether a worker row still exists. Used by tests asserting that a
/// graceful stop leaves the row behind for an administrator to remove.
pub async fn worker_row_exists(db: &Database, worker_id: i64) -> anyhow::Result<bool> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM workers WHERE id = $1")
        .bind(worker_id)
        .fetch_optional(db.pool())
        .await?;
    Ok(id.is_some())
}

#[ctor::ctor]
fn setup_tracing() {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
