use std::fmt;

/// The lifecycle state of a [`Task`](crate::Task).
///
/// The numeric values are part of the storage contract and must not be
/// renumbered: other language implementations of this same coordination
/// protocol read this column directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum TaskStatus {
    Pending = 1,
    Running = 2,
    Error = 3,
    Done = 4,
    Timeout = 5,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Timeout)
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            1 => Self::Pending,
            2 => Self::Running,
            3 => Self::Error,
            4 => Self::Done,
            5 => Self::Timeout,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Error => "ERROR",
            Self::Done => "DONE",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(name)
    }
}
