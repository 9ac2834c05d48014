use std::time::Duration;

use chrono::Utc;
use queueless_core::{Database, Result, TaskStatus};

/// The cleanup/reclamation sweep.
///
/// Every worker runs this on every loop tick; there is no leader election.
/// It is safe to run concurrently from many workers because every step is
/// taken under a row lock within a single transaction.
pub async fn cleanup(db: &Database, cleanup_timeout: Duration) -> Result<()> {
    let threshold = Utc::now()
        - chrono::Duration::from_std(cleanup_timeout)
            .expect("cleanup_timeout does not fit in a chrono::Duration");

    db.transaction(move |conn| async move {
        let dead_workers = sqlx::query!(
            "
            SELECT id, working_on_task_id
            FROM workers
            WHERE last_heartbeat < $1
            FOR UPDATE
            ",
            threshold,
        )
        .fetch_all(&mut *conn)
        .await?;

        for dead_worker in dead_workers {
            let Some(task_id) = dead_worker.working_on_task_id else {
                continue;
            };

            let task = sqlx::query!(
                "SELECT retries FROM tasks WHERE id = $1 FOR UPDATE",
                task_id
            )
            .fetch_optional(&mut *conn)
            .await?;

            // The task may have been deleted out from underneath us (not something
            // the core does today, but nothing here should assume otherwise).
            let Some(task) = task else {
                continue;
            };

            if task.retries == 0 {
                sqlx::query!(
                    "UPDATE tasks SET owner = 0, status = $1, last_updated = now() WHERE id = $2",
                    TaskStatus::Timeout.as_i32(),
                    task_id,
                )
                .execute(&mut *conn)
                .await?;

                tracing::info!(
                    worker_id = dead_worker.id,
                    task_id,
                    "reclaimed task from dead worker; retries exhausted, marked TIMEOUT"
                );
            } else {
                sqlx::query!(
                    "
                    UPDATE tasks
                       SET owner = 0, status = $1, retries = retries - 1, last_updated = now()
                     WHERE id = $2
                    ",
                    TaskStatus::Pending.as_i32(),
                    task_id,
                )
                .execute(&mut *conn)
                .await?;

                tracing::info!(
                    worker_id = dead_worker.id,
                    task_id,
                    retries_left = task.retries - 1,
                    "reclaimed task from dead worker; returned to PENDING"
                );
            }

            sqlx::query!(
                "UPDATE workers SET working_on_task_id = NULL WHERE id = $1",
                dead_worker.id,
            )
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    })
    .await
}
