//! The worker loop: registration, heartbeat, claim, execute, save, and the
//! cleanup/reclamation sweep.

mod cleanup;
mod flag;
mod worker;

pub use self::cleanup::cleanup;
pub use self::worker::{Worker, WorkerBuilder, WorkerExit, WorkerHandle};
