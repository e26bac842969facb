//! SQLite error types.

use crate::error::RepositoryError;

pub type SqliteResult<T> = Result<T, SqliteError>;

/// SQLite-specific errors.
#[derive(Debug)]
pub enum SqliteError {
    /// SQLite error from rusqlite
    Sqlite(rusqlite::Error),
    /// Statement issued on a connection that is not open
    ConnectionClosed,
}

impl std::fmt::Display for SqliteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqliteError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            SqliteError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SqliteError::Sqlite(e) => Some(e),
            SqliteError::ConnectionClosed => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(e: rusqlite::Error) -> Self {
        SqliteError::Sqlite(e)
    }
}

/// Statement-time failures. Open failures are mapped at the call site.
impl From<SqliteError> for RepositoryError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::ConnectionClosed => RepositoryError::StateError(e.to_string()),
            SqliteError::Sqlite(_) => RepositoryError::QueryError(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(e: rusqlite::Error) -> Self {
        SqliteError::Sqlite(e).into()
    }
}
