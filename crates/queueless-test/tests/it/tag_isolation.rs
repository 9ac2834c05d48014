//! a worker whose tag doesn't match `requires_tag` never claims the
//! task; once a worker with the matching tag starts, it does.

use std::sync::Arc;
use std::time::Duration;

use queueless_client::Client;
use queueless_core::{Database, FunctionRegistry, SubmitOptions, TaskStatus};

#[sqlx::test]
async fn worker_never_claims_mismatched_tag(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let client = Client::new(db.clone());

    let task_id = client
        .submit(SubmitOptions::new(b"len_plus", b"{}", 1).requires_tag("B"))
        .await?;

    let mut registry_a = FunctionRegistry::new();
    registry_a.register("len_plus", queueless_test::len_plus);
    let worker_a = queueless_test::spawn_worker(db.clone(), Arc::new(registry_a), "A").await;

    // Give worker A several ticks to (fail to) claim it.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.get_status(task_id).await?, TaskStatus::Pending);

    worker_a.shutdown().await?;

    let mut registry_b = FunctionRegistry::new();
    registry_b.register("len_plus", queueless_test::len_plus);
    let _worker_b = queueless_test::spawn_worker(db, Arc::new(registry_b), "B").await;

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

    Ok(())
}
