//! The client half of the queueless protocol: `submit`, `get_status`,
//! `get_result`. Every operation is exactly one scoped transaction against
//! the shared [`Database`] handle.

use chrono::Utc;
use queueless_core::{Database, Error, Result, SubmitOptions, Task, TaskStatus};

/// A handle for submitting and polling tasks.
///
/// `Client` is cheap to clone (it just clones the underlying connection
/// pool handle) and has no background activity of its own — unlike
/// [`queueless_worker::Worker`], nothing here polls or sleeps.
#[derive(Clone)]
pub struct Client {
    db: Database,
}

impl Client {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new task in the `PENDING` state and return its id.
    ///
    /// Defaults: `requires_tag=""`, `retries=1`.
    pub async fn submit(&self, options: SubmitOptions<'_>) -> Result<i64> {
        let now = Utc::now();

        let id: i64 = self
            .db
            .transaction(move |conn| {
                async move {
                    let record = sqlx::query!(
                        "
                        INSERT INTO tasks
                            (creator, owner, status, function, kwargs, results, retries,
                             requires_tag, last_updated)
                        VALUES ($1, 0, $2, $3, $4, '', $5, $6, $7)
                        RETURNING id
                        ",
                        options.creator,
                        TaskStatus::Pending.as_i32(),
                        options.function,
                        options.kwargs,
                        options.retries,
                        options.requires_tag,
                        now,
                    )
                    .fetch_one(&mut *conn)
                    .await?;

                    Ok(record.id)
                }
            })
            .await?;

        tracing::debug!(task_id = id, "submitted task");
        Ok(id)
    }

    /// Read the current status of a task.
    pub async fn get_status(&self, task_id: i64) -> Result<TaskStatus> {
        let record = sqlx::query!("SELECT status FROM tasks WHERE id = $1", task_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| Error::not_found(task_id))?;

        Ok(TaskStatus::from_i32(record.status)
            .unwrap_or_else(|| unreachable!("status column held an out-of-range value")))
    }

    /// Read the result blob for a task.
    ///
    /// Returns `None` when the column is empty: while the task is still
    /// `PENDING`/`RUNNING`, and permanently for `TIMEOUT` tasks, whose
    /// outcome is unobservable. Interpreting the bytes, whether they
    /// represent a success value or an error description, is the caller's
    /// problem — the same blob column serves both.
    pub async fn get_result(&self, task_id: i64) -> Result<Option<Vec<u8>>> {
        let record = sqlx::query!("SELECT results FROM tasks WHERE id = $1", task_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| Error::not_found(task_id))?;

        Ok(if record.results.is_empty() {
            None
        } else {
            Some(record.results)
        })
    }

    /// Fetch the full task row.
    ///
    /// Convenience on top of `get_status`/`get_result` so a caller that
    /// wants both doesn't need two round trips; not a new capability.
    pub async fn get_task(&self, task_id: i64) -> Result<Task> {
        let record = sqlx::query!(
            "
            SELECT id, creator, owner, status, function, kwargs, results, retries,
                   requires_tag, last_updated
            FROM tasks
            WHERE id = $1
            ",
            task_id
        )
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| Error::not_found(task_id))?;

        Ok(Task {
            id: record.id,
            creator: record.creator,
            owner: record.owner,
            status: TaskStatus::from_i32(record.status)
                .unwrap_or_else(|| unreachable!("status column held an out-of-range value")),
            function: record.function,
            kwargs: record.kwargs,
            results: record.results,
            retries: record.retries,
            requires_tag: record.requires_tag,
            last_updated: record.last_updated,
        })
    }
}
