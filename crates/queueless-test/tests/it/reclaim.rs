//! a worker that claims a task and then disappears mid-execution has
//! its task reclaimed and completed by a different worker.

use std::sync::Arc;
use std::time::Duration;

use queueless_client::Client;
use queueless_core::{Config, Database, FunctionRegistry, SubmitOptions, TaskStatus};
use queueless_test::HangingExecutor;

#[sqlx::test]
async fn task_reclaimed_from_dead_worker_then_completes(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let client = Client::new(db.clone());

    let task_id = client
        .submit(SubmitOptions::new(b"len_plus", br#"{"param": "abc"}"#, 1).retries(1))
        .await?;

    let config = Config::new()
        .tick_interval(Duration::from_millis(30))
        .cleanup_timeout(Duration::from_millis(250));

    let hanger = HangingExecutor::new();
    let worker_a =
        queueless_test::spawn_worker_with_config(db.clone(), hanger.clone(), "", config.clone())
            .await;

    // Wait for A to actually claim and start executing before "killing" it.
    queueless_test::poll_until(Duration::from_secs(5), Duration::from_millis(20), || {
        let hanger = &hanger;
        async move { Ok((hanger.calls() > 0).then_some(())) }
    })
    .await
    .expect("worker A never claimed the task");

    worker_a.abort();

    let mut registry = FunctionRegistry::new();
    registry.register("len_plus", queueless_test::len_plus);
    let _worker_b =
        queueless_test::spawn_worker_with_config(db, Arc::new(registry), "", config).await;

    let status = queueless_test::poll_until(Duration::from_secs(10), Duration::from_millis(50), || {
        let client = &client;
        async move {
            let status = client.get_status(task_id).await?;
            Ok(status.is_terminal().then_some(status))
        }
    })
    .await
    .expect("task did not reach a terminal status within 10s");

    assert_eq!(status, TaskStatus::Done);

    let task = client.get_task(task_id).await?;
    assert_eq!(task.retries, 0);

    Ok(())
}
