use chrono::{DateTime, Utc};

use crate::status::TaskStatus;

/// The sentinel value of [`Task::owner`] meaning "no worker owns this task".
///
/// Worker ids are assigned by the database's identity column starting at 1,
/// so 0 never collides with a real worker id.
pub const NO_OWNER: i64 = 0;

/// A row of the `tasks` table, as seen by a client or worker.
///
/// `function` and `kwargs` are opaque payload blobs; `queueless-core` never
/// interprets them — encoding and execution are external collaborators.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: i64,
    pub creator: i64,
    pub owner: i64,
    pub status: TaskStatus,
    pub function: Vec<u8>,
    pub kwargs: Vec<u8>,
    pub results: Vec<u8>,
    pub retries: i32,
    pub requires_tag: String,
    pub last_updated: DateTime<Utc>,
}

impl Task {
    pub fn has_owner(&self) -> bool {
        self.owner != NO_OWNER
    }
}

/// The parameters accepted by a client's `submit` call, separated out so
/// that defaults (`requires_tag=""`, `retries=1`) live in one place.
#[derive(Clone, Debug)]
pub struct SubmitOptions<'a> {
    pub function: &'a [u8],
    pub kwargs: &'a [u8],
    pub creator: i64,
    pub requires_tag: &'a str,
    pub retries: i32,
}

impl<'a> SubmitOptions<'a> {
    pub fn new(function: &'a [u8], kwargs: &'a [u8], creator: i64) -> Self {
        Self {
            function,
            kwargs,
            creator,
            requires_tag: "",
            retries: 1,
        }
    }

    pub fn requires_tag(mut self, tag: &'a str) -> Self {
        self.requires_tag = tag;
        self
    }

    pub fn retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }
}

/// A row of the `workers` table.
#[derive(Clone, Debug)]
pub struct WorkerRow {
    pub id: i64,
    pub tag: String,
    pub last_heartbeat: DateTime<Utc>,
    pub working_on_task_id: Option<i64>,
}
