//! a task whose workers never return exhausts its retry budget and
//! becomes TIMEOUT, with `retries` left at 0.

use std::time::Duration;

use queueless_client::Client;
use queueless_core::{Config, Database, FunctionRegistry, SubmitOptions, TaskStatus};
use queueless_test::HangingExecutor;

#[sqlx::test]
async fn exhausted_retries_become_timeout(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let client = Client::new(db.clone());

    let task_id = client
        .submit(
            SubmitOptions::new(b"sleep", br#"{"seconds": 5}"#, 1)
                .requires_tag("hang")
                .retries(2),
        )
        .await?;

    let worker_config = Config::new()
        .tick_interval(Duration::from_millis(30))
        .cleanup_timeout(Duration::from_millis(250));

    // Three hanging workers: each one permanently occupies itself the
    // instant it claims the task, so three distinct workers are needed to
    // cover the three PENDING->RUNNING cycles this scenario requires
    // (retries=2 means two reclaims back to PENDING, a third claim reaches
    // TIMEOUT).
    let _hangers: Vec<_> = futures::future::join_all((0..3).map(|_| {
        let db = db.clone();
        let config = worker_config.clone();
        async move { queueless_test::spawn_worker_with_config(db, HangingExecutor::new(), "hang", config).await }
    }))
    .await;

    // A fourth worker whose tag never matches `requires_tag="hang"`, so it
    // only ever runs heartbeat + cleanup sweeps.
    let _sweeper = queueless_test::spawn_worker_with_config(
        db,
        std::sync::Arc::new(FunctionRegistry::new()),
        "sweeper",
        worker_config,
    )
    .await;

    let status = queueless_test::poll_until(Duration::from_secs(10), Duration::from_millis(50), || {
        let client = &client;
        async move {
            let status = client.get_status(task_id).await?;
            Ok(status.is_terminal().then_some(status))
        }
    })
    .await
    .expect("task did not reach a terminal status within 10s");

    assert_eq!(status, TaskStatus::Timeout);

    let task = client.get_task(task_id).await?;
    assert_eq!(task.retries, 0);
    assert_eq!(task.owner, queueless_core::NO_OWNER);
    assert!(client.get_result(task_id).await?.is_none());

    Ok(())
}
