//! Error types for the repository layer.
//!
//! Driver failures are wrapped, never reinterpreted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Provider resolution or physical open failed.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// State was queried before any connection was established.
    #[error("No connection has been established")]
    NoConnection,

    /// The connection handle is borrowed elsewhere.
    #[error("Connection state error: {0}")]
    StateError(String),

    #[error("Parameter binding error: {0}")]
    BindingError(String),

    #[error("Row mapping error: {0}")]
    MappingError(String),

    #[error("Expected a single row, got {0}")]
    CardinalityError(usize),

    #[error("The result set is empty")]
    EmptyResult,

    #[error("Query execution error: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RepositoryError {
    /// Prefix a mapping failure with the column it came from.
    #[doc(hidden)]
    pub fn for_column(self, column: &str) -> Self {
        match self {
            RepositoryError::MappingError(msg) => {
                RepositoryError::MappingError(format!("column '{}': {}", column, msg))
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
