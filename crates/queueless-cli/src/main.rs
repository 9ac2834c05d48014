//! Worker process entry point: `<program> <db_url> [<tag>]
//! [<tick_seconds>]`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use queueless_core::{Config, Database, FunctionRegistry};
use queueless_worker::{WorkerBuilder, WorkerExit, WorkerHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// `queueless-worker <db_url> [<tag>] [<tick_seconds>]`
///
/// Defaults: `tag=""`, `tick_seconds=1.0`. `--cleanup-timeout` is an
/// additional flag for the one other runtime knob (default 300s).
#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Args {
    /// Database connection string (creates the database and tables if
    /// they don't already exist).
    #[arg(env = "DATABASE_URL")]
    db_url: String,

    /// Capability tag. Only tasks whose `requires_tag` matches this value
    /// or is empty may be claimed by this worker.
    #[arg(default_value = "")]
    tag: String,

    /// Sleep between loop iterations, in seconds.
    #[arg(default_value_t = 1.0)]
    tick_seconds: f64,

    /// Seconds of heartbeat silence after which a worker is presumed dead.
    #[arg(long, env = "QUEUELESS_CLEANUP_TIMEOUT", value_parser = humantime::parse_duration, default_value = "300s")]
    cleanup_timeout: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_filter(tracing_subscriber::EnvFilter::from_default_env()),
        )
        .init();

    let db = Database::connect(&args.db_url)
        .await
        .context("failed to connect to the database")?;

    let config = Config::new()
        .tick_interval(Duration::from_secs_f64(args.tick_seconds.max(0.0)))
        .cleanup_timeout(args.cleanup_timeout);

    // This binary ships the simplest possible executor, a name-keyed
    // function table, as a usable default rather than leaving the worker
    // unable to run anything. A deployment with a real payload carrier
    // supplies its own `Executor` impl via `queueless_worker::WorkerBuilder`
    // directly instead of this CLI.
    let executor = Arc::new(demo_functions());

    let mut worker = WorkerBuilder::new(db, executor)
        .config(config)
        .tag(args.tag.clone())
        .build();

    let handle = worker.handle();

    let signal = tokio::task::spawn(async move {
        struct DropGuard(WorkerHandle);

        impl Drop for DropGuard {
            fn drop(&mut self) {
                self.0.shutdown();
            }
        }

        let _guard = DropGuard(handle);

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                _ = sigint.recv() => (),
                _ = sigterm.recv() => (),
            }
        }

        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await?;

        tracing::info!("got signal, shutting down");

        anyhow::Ok(())
    });

    tracing::info!(tag = %args.tag, tick_seconds = args.tick_seconds, "queueless worker starting up");
    let exit = worker.run().await?;

    // The signal task only ever finishes early on a signal-handling error;
    // a normal shutdown leaves it pending until `DropGuard` fires above.
    if signal.is_finished() {
        signal
            .await
            .context("signal task exited early with an error")??;
    } else {
        signal.abort();
    }

    match exit {
        WorkerExit::AdminStop => {
            tracing::info!("worker row was deleted; exiting cleanly");
            Ok(())
        }
        WorkerExit::Shutdown => {
            tracing::info!("shut down on request");
            Ok(())
        }
    }
}

fn demo_functions() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    registry.register("len_plus", |kwargs| {
        let param = kwargs["param"].as_str().ok_or("missing param")?;
        Ok(serde_json::json!(param.len() as i64 + 42))
    });

    registry.register("sleep", |kwargs| {
        let seconds = kwargs["seconds"].as_f64().ok_or("missing seconds")?;
        std::thread::sleep(Duration::from_secs_f64(seconds));
        Ok(serde_json::Value::Null)
    });

    registry
}
