//! Deleting a worker's row is the administrative kill signal: its next
//! heartbeat observes the missing row and the loop exits cleanly. A
//! graceful in-process shutdown request is exercised alongside it, since
//! both are "stop the loop" outcomes distinguished by `WorkerExit`.

use std::sync::Arc;
use std::time::Duration;

use queueless_client::Client;
use queueless_core::{Config, Database, FunctionRegistry, SubmitOptions, TaskStatus};
use queueless_worker::WorkerExit;

#[sqlx::test]
async fn admin_deleting_worker_row_stops_the_loop_cleanly(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let client = Client::new(db.clone());

    let mut registry = FunctionRegistry::new();
    registry.register("len_plus", queueless_test::len_plus);

    let config = Config::new().tick_interval(Duration::from_millis(50));
    let worker =
        queueless_test::spawn_worker_with_config(db.clone(), Arc::new(registry), "W", config)
            .await;

    let task_id = client
        .submit(
            SubmitOptions::new(b"len_plus", br#"{"param": "abc"}"#, 1)
                .requires_tag("W")
                .retries(1),
        )
        .await?;

    queueless_test::poll_until(Duration::from_secs(10), Duration::from_millis(50), || {
        let client = &client;
        async move {
            let status = client.get_status(task_id).await?;
            Ok((status == TaskStatus::Done).then_some(()))
        }
    })
    .await
    .expect("task never completed");

    let worker_id = queueless_test::most_recent_worker_id(&db).await?;
    db.remove_worker(worker_id).await?;

    let exit = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not notice its row was deleted within 5s")?;

    assert_eq!(exit, WorkerExit::AdminStop);

    // No corrupted task state: the completed task is untouched.
    assert_eq!(client.get_status(task_id).await?, TaskStatus::Done);

    Ok(())
}

#[sqlx::test]
async fn graceful_shutdown_request_stops_the_loop(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let worker =
        queueless_test::spawn_worker(db.clone(), Arc::new(FunctionRegistry::new()), "idle").await;

    // Give the loop a moment to actually start running.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let worker_id = queueless_test::most_recent_worker_id(&db).await?;

    let exit = tokio::time::timeout(Duration::from_secs(5), worker.shutdown())
        .await
        .expect("worker did not shut down within 5s")?;

    assert_eq!(exit, WorkerExit::Shutdown);

    // A graceful stop is not a self-deletion: the row is left behind for an
    // administrator (or the cleanup sweep, eventually) to deal with.
    assert!(queueless_test::worker_row_exists(&db, worker_id).await?);

    Ok(())
}
