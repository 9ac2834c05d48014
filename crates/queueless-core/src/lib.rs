//! Schema, transaction scope, data model, and the payload-execution
//! boundary shared by the queueless client and worker crates.

mod config;
mod db;
mod error;
mod executor;
mod status;
mod task;

pub use self::config::Config;
pub use self::db::Database;
pub use self::error::{Error, ErrorKind, Result};
pub use self::executor::{Executor, FunctionRegistry};
pub use self::status::TaskStatus;
pub use self::task::{SubmitOptions, Task, WorkerRow, NO_OWNER};
