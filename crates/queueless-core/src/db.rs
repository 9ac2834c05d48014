use std::future::Future;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};

use crate::error::Result;

const CREATE_TASKS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id             BIGSERIAL PRIMARY KEY,
    creator        BIGINT NOT NULL,
    owner          BIGINT NOT NULL DEFAULT 0,
    status         INT NOT NULL,
    function       BYTEA NOT NULL,
    kwargs         BYTEA NOT NULL,
    results        BYTEA NOT NULL DEFAULT '',
    retries        INT NOT NULL,
    requires_tag   TEXT NOT NULL DEFAULT '',
    last_updated   TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const CREATE_WORKERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS workers (
    id                   BIGSERIAL PRIMARY KEY,
    tag                  TEXT NOT NULL DEFAULT '',
    last_heartbeat       TIMESTAMPTZ NOT NULL DEFAULT now(),
    working_on_task_id   BIGINT
)";

/// The schema and transaction layer.
///
/// A `Database` wraps a connection pool. There is no process-wide
/// singleton: every client and worker constructs or is handed one explicit
/// `Database` at startup and threads it through.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to `db_url`, creating the target database and both tables if
    /// they don't already exist. Idempotent: safe to call from every process
    /// that starts up.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let opts: PgConnectOptions = db_url.parse()?;
        ensure_database_exists(&opts).await?;

        let pool = PgPoolOptions::new().connect_with(opts).await?;
        let db = Self { pool };
        db.ensure_schema().await?;

        Ok(db)
    }

    /// Wrap an already-constructed pool. Still runs the idempotent schema
    /// creation so tests that hand in a fresh `sqlx::test` pool work the
    /// same way a `connect`ed one does.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TASKS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_WORKERS_TABLE)
            .execute(&self.pool)
            .await?;

        tracing::debug!("schema is up to date");
        Ok(())
    }

    /// The scoped-transaction primitive: open a transaction, run `f`
    /// against it, commit on success, roll back on failure. The pool
    /// connection is always returned on exit.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tracing::debug!("begin transaction");
        let mut tx = self.pool.begin().await?;
        let result = f(&mut tx).await;

        match result {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("commit transaction");
                Ok(value)
            }
            Err(error) => {
                // Best-effort: the transaction is also rolled back automatically
                // when `tx` is dropped if we don't reach this explicit call.
                let _ = tx.rollback().await;
                tracing::debug!("rollback transaction");
                Err(error)
            }
        }
    }

    /// Administrative removal of a worker row. A deleted row is the signal
    /// a worker's own heartbeat uses to detect it has been told to stop.
    /// Nothing in the worker loop or cleanup sweep calls this automatically.
    pub async fn remove_worker(&self, worker_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn ensure_database_exists(opts: &PgConnectOptions) -> Result<()> {
    let name = opts.get_database().unwrap_or("postgres").to_owned();
    let admin_opts = opts.clone().database("postgres");

    let mut conn = PgConnection::connect_with(&admin_opts).await?;

    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(&name)
        .fetch_optional(&mut conn)
        .await?;

    if exists.is_none() {
        // Database names can't be parameterized; `name` only ever comes from
        // the connection string the operator supplied.
        let create = format!("CREATE DATABASE \"{}\"", name.replace('"', "\"\""));
        sqlx::query(&create).execute(&mut conn).await?;
        tracing::info!(database = %name, "created database");
    }

    Ok(())
}
