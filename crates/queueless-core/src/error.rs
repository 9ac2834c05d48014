use std::fmt;

/// The error type returned by every `queueless-core` operation.
///
/// The inner representation is private; callers inspect failures through
/// [`Error::kind`] and the standard [`std::error::Error::source`] chain.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(ErrorData);

#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// A connection or SQL failure occurred while talking to the database.
    ///
    /// The transaction the error occurred in, if any, has already been
    /// rolled back. The inner [`sqlx::Error`] is available via `source`.
    Database,

    /// A task id was looked up that does not exist in the `tasks` table.
    NotFound,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            ErrorData::Database(_) => ErrorKind::Database,
            ErrorData::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn not_found(task_id: i64) -> Self {
        Self(ErrorData::NotFound(task_id))
    }
}

#[derive(Debug, thiserror::Error)]
enum ErrorData {
    #[error(transparent)]
    Database(sqlx::Error),
    #[error("no task with id {0}")]
    NotFound(i64),
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self(ErrorData::Database(error))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Database => "database",
            ErrorKind::NotFound => "not-found",
        };
        f.write_str(name)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
