use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use queueless_core::{Config, Database, Executor, TaskStatus};
use rand::Rng;

use crate::cleanup;
use crate::flag::ShutdownFlag;

/// The outcome of a worker loop exiting normally.
///
/// Distinguished from a propagated `Err` (a database error during heartbeat
/// is treated as potentially transient: the worker surfaces it and exits)
/// so the CLI can pick exit code 0 only for the admin-kill / graceful
/// shutdown path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WorkerExit {
    /// The worker's own row was deleted: the administrative kill signal.
    AdminStop,
    /// A graceful shutdown was requested in-process (e.g. `Ctrl+C`).
    Shutdown,
}

struct ClaimedTask {
    id: i64,
    function: Vec<u8>,
    kwargs: Vec<u8>,
}

/// A single worker process.
///
/// The loop is single-threaded and sequential by design: parallelism comes
/// from running many `Worker`s as independent processes, not from
/// parallelizing inside one.
pub struct Worker {
    db: Database,
    executor: Arc<dyn Executor>,
    config: Config,
    tag: String,
    shutdown: ShutdownFlag,
    worker_id: i64,
}

/// Builds a [`Worker`], mirroring the builder shape used throughout this
/// workspace for multi-field setup.
pub struct WorkerBuilder {
    db: Database,
    executor: Arc<dyn Executor>,
    config: Config,
    tag: String,
}

impl WorkerBuilder {
    pub fn new(db: Database, executor: Arc<dyn Executor>) -> Self {
        Self {
            db,
            executor,
            config: Config::default(),
            tag: String::new(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn build(self) -> Worker {
        Worker {
            db: self.db,
            executor: self.executor,
            config: self.config,
            tag: self.tag,
            shutdown: ShutdownFlag::new(),
            // Not yet registered; this is never a valid owner id (ids
            // assigned by the database start above 0).
            worker_id: 0,
        }
    }
}

/// A cloneable handle that can request a graceful shutdown of a running
/// [`Worker::run`] loop from another task.
#[derive(Clone)]
pub struct WorkerHandle {
    shutdown: ShutdownFlag,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.shutdown.raise();
    }
}

impl Worker {
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn id(&self) -> i64 {
        self.worker_id
    }

    /// Run the worker loop to completion.
    ///
    /// Returns `Ok(WorkerExit)` on a clean stop, and propagates database
    /// errors otherwise. The worker's own row is never removed here, on
    /// either exit path: a row is only ever deleted by an external
    /// administrative call. A graceful stop just leaves the row behind,
    /// idle, with its last heartbeat — the same as a worker that is still
    /// starting up.
    pub async fn run(&mut self) -> anyhow::Result<WorkerExit> {
        self.worker_id = self.register().await.context("failed to register worker")?;
        tracing::info!(worker_id = self.worker_id, tag = %self.tag, "worker registered");

        let exit = self.run_loop().await?;
        tracing::info!(worker_id = self.worker_id, ?exit, "worker loop exited");

        Ok(exit)
    }

    async fn run_loop(&mut self) -> anyhow::Result<WorkerExit> {
        loop {
            if self.shutdown.is_raised() {
                return Ok(WorkerExit::Shutdown);
            }

            if !self.heartbeat().await.context("heartbeat failed")? {
                return Ok(WorkerExit::AdminStop);
            }

            cleanup::cleanup(&self.db, self.config.cleanup_timeout)
                .await
                .context("cleanup sweep failed")?;

            tokio::select! {
                _ = tokio::time::sleep(self.jittered_tick()) => (),
                _ = self.shutdown.wait() => return Ok(WorkerExit::Shutdown),
            }

            if let Some(task) = self.claim().await.context("claim failed")? {
                self.execute_and_save(task).await;
            }
        }
    }

    fn jittered_tick(&self) -> Duration {
        let tick = self.config.tick_interval;
        let jitter_frac = self.config.heartbeat_jitter.clamp(0.0, 0.9);
        if jitter_frac <= 0.0 {
            return tick;
        }

        let max_jitter_nanos = (tick.as_nanos() as f64 * jitter_frac) as u64;
        if max_jitter_nanos == 0 {
            return tick;
        }

        let jitter = rand::thread_rng().gen_range(0..max_jitter_nanos);
        tick.saturating_sub(Duration::from_nanos(jitter))
    }

    /// Registration: one INSERT, returns the assigned id.
    async fn register(&self) -> queueless_core::Result<i64> {
        let tag = self.tag.clone();
        self.db
            .transaction(move |conn| async move {
                let record = sqlx::query!(
                    "
                    INSERT INTO workers (tag, last_heartbeat, working_on_task_id)
                    VALUES ($1, now(), NULL)
                    RETURNING id
                    ",
                    tag,
                )
                .fetch_one(&mut *conn)
                .await?;

                Ok(record.id)
            })
            .await
    }

    /// Heartbeat. Returns `false` when this worker's row has been deleted
    /// — the administrative kill signal.
    async fn heartbeat(&self) -> queueless_core::Result<bool> {
        let worker_id = self.worker_id;
        self.db
            .transaction(move |conn| async move {
                let record = sqlx::query!(
                    "SELECT id FROM workers WHERE id = $1 FOR UPDATE",
                    worker_id
                )
                .fetch_optional(&mut *conn)
                .await?;

                if record.is_none() {
                    return Ok(false);
                }

                sqlx::query!(
                    "UPDATE workers SET last_heartbeat = now() WHERE id = $1",
                    worker_id,
                )
                .execute(&mut *conn)
                .await?;

                Ok(true)
            })
            .await
    }

    /// Claim: the one operation that must guarantee at-most-one worker
    /// transitions a given task from PENDING to RUNNING.
    async fn claim(&self) -> queueless_core::Result<Option<ClaimedTask>> {
        let worker_id = self.worker_id;
        let tag = self.tag.clone();

        self.db
            .transaction(move |conn| async move {
                let row = sqlx::query!(
                    "
                    SELECT id, function, kwargs
                    FROM tasks
                    WHERE status = $1
                      AND owner = 0
                      AND (requires_tag = $2 OR requires_tag = '')
                    ORDER BY id ASC
                    LIMIT 1
                    FOR UPDATE
                    ",
                    TaskStatus::Pending.as_i32(),
                    tag,
                )
                .fetch_optional(&mut *conn)
                .await?;

                let Some(row) = row else {
                    return Ok(None);
                };

                sqlx::query!(
                    "UPDATE tasks SET owner = $1, status = $2, last_updated = now() WHERE id = $3",
                    worker_id,
                    TaskStatus::Running.as_i32(),
                    row.id,
                )
                .execute(&mut *conn)
                .await?;

                sqlx::query!(
                    "UPDATE workers SET working_on_task_id = $1 WHERE id = $2",
                    row.id,
                    worker_id,
                )
                .execute(&mut *conn)
                .await?;

                tracing::info!(worker_id, task_id = row.id, "claimed task");

                Ok(Some(ClaimedTask {
                    id: row.id,
                    function: row.function,
                    kwargs: row.kwargs,
                }))
            })
            .await
    }

    /// Execute followed by save. Execution happens strictly outside of any
    /// transaction.
    async fn execute_and_save(&self, task: ClaimedTask) {
        let task_id = task.id;
        let outcome = self.executor.call(&task.function, &task.kwargs).await;

        if let Err(error) = self.save(task_id, outcome).await {
            tracing::error!(task_id, %error, "failed to save task result");
        }
    }

    /// Save, including the ownership guard that makes it safe for cleanup
    /// to have reclaimed the task out from under us.
    async fn save(
        &self,
        task_id: i64,
        outcome: Result<Vec<u8>, String>,
    ) -> queueless_core::Result<()> {
        let worker_id = self.worker_id;

        self.db
            .transaction(move |conn| async move {
                let row = sqlx::query!(
                    "SELECT status, owner FROM tasks WHERE id = $1 FOR UPDATE",
                    task_id
                )
                .fetch_optional(&mut *conn)
                .await?;

                let still_ours = matches!(
                    row,
                    Some(ref row)
                        if row.status == TaskStatus::Running.as_i32() && row.owner == worker_id
                );

                if still_ours {
                    let (results, status) = match outcome {
                        Ok(bytes) => (bytes, TaskStatus::Done),
                        Err(message) => (message.into_bytes(), TaskStatus::Error),
                    };

                    sqlx::query!(
                        "UPDATE tasks SET results = $1, status = $2, last_updated = now() WHERE id = $3",
                        results,
                        status.as_i32(),
                        task_id,
                    )
                    .execute(&mut *conn)
                    .await?;

                    tracing::info!(task_id, worker_id, %status, "saved task result");
                } else {
                    tracing::debug!(
                        task_id,
                        worker_id,
                        "discarding result: task was reclaimed before we could save"
                    );
                }

                sqlx::query!(
                    "UPDATE workers SET working_on_task_id = NULL WHERE id = $1",
                    worker_id,
                )
                .execute(&mut *conn)
                .await?;

                Ok(())
            })
            .await
    }
}
