//! a task submitted with a matching tag is claimed and completed by a
//! single worker within 10 seconds.

use std::sync::Arc;
use std::time::Duration;

use queueless_client::Client;
use queueless_core::{Database, FunctionRegistry, SubmitOptions, TaskStatus};

#[sqlx::test]
async fn submitted_task_is_claimed_and_completed(pool: sqlx::PgPool) -> anyhow::Result<()> {
    let db = Database::from_pool(pool).await?;
    let client = Client::new(db.clone());

    let mut registry = FunctionRegistry::new();
    registry.register("len_plus", queueless_test::len_plus);

    let _worker = queueless_test::spawn_worker(db, Arc::new(registry), "B").await;

    let task_id = client
        .submit(
            SubmitOptions::new(b"len_plus", br#"{"param": "abc"}"#, 123)
                .requires_tag("B")
                .retries(1),
        )
        .await?;

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

    let result = client.get_result(task_id).await?.expect("result present");
    let value: serde_json::Value = serde_json::from_slice(&result)?;
    assert_eq!(value, serde_json::json!(45));

    Ok(())
}
