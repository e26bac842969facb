//! SQLite connection implementation.

use rusqlite::{Batch, Connection, Statement};
use smallvec::SmallVec;

use crate::binder::Binding;
use crate::connection::{Command, ConnectionState, DbConnection, RowSink};
use crate::error::{RepositoryError, Result};
use crate::provider::ConnectionFactory;
use crate::value::Value;

use super::error::{SqliteError, SqliteResult};

/// A SQLite connection.
///
/// Created closed; [`DbConnection::open`] attaches the database named by
/// the connection string. Every statement text may hold several
/// `;`-separated statements, which run in order on the same connection.
pub struct SqliteConnection {
    connection_string: String,
    conn: Option<Connection>,
}

impl SqliteConnection {
    /// Create a closed connection.
    ///
    /// Supports:
    /// - `sqlite::memory:`, `sqlite://:memory:` or `:memory:` for an in-memory database
    /// - `sqlite://path`, `sqlite:path`, `Data Source=path` or a bare path for a file
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            conn: None,
        }
    }

    /// Create and open in one step, for callers that pin their own connection.
    pub fn open_new(connection_string: &str) -> Result<Self> {
        let mut conn = Self::new(connection_string);
        conn.open()?;
        Ok(conn)
    }

    /// Database path named by the connection string.
    pub fn path(&self) -> &str {
        database_path(&self.connection_string)
    }

    /// The underlying rusqlite connection, when open.
    pub fn raw(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn attach(&self) -> SqliteResult<Connection> {
        let path = self.path();
        let is_memory = path == ":memory:";
        let conn = if is_memory {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };

        // Performance pragmas for file-based databases
        if !is_memory {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA busy_timeout=5000;",
            )?;
        }

        Ok(conn)
    }

    fn handle(&self) -> SqliteResult<&Connection> {
        self.conn.as_ref().ok_or(SqliteError::ConnectionClosed)
    }
}

impl DbConnection for SqliteConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = self
            .attach()
            .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| RepositoryError::ConnectionError(SqliteError::from(e).to_string())),
            None => Ok(()),
        }
    }

    fn query(&mut self, command: &Command, sink: &mut dyn RowSink) -> Result<()> {
        let conn = self.handle()?;
        let mut batch = Batch::new(conn, &command.text);
        let mut read = false;

        while let Some(mut stmt) = batch.next()? {
            bind_parameters(&mut stmt, &command.parameters)?;
            if read || stmt.column_count() == 0 {
                run_to_completion(conn, &mut stmt)?;
                continue;
            }

            let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            sink.columns(&columns)?;

            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next()? {
                // Inline storage for rows with up to 16 columns
                let mut values: SmallVec<[Value; 16]> = SmallVec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(Value::from_value_ref(row.get_ref(i)?));
                }
                sink.row(&values)?;
            }
            read = true;
        }

        if !read {
            sink.columns(&[])?;
        }
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<u64> {
        let conn = self.handle()?;
        let mut batch = Batch::new(conn, &command.text);
        let mut rows_affected = 0u64;

        while let Some(mut stmt) = batch.next()? {
            bind_parameters(&mut stmt, &command.parameters)?;
            rows_affected += run_to_completion(conn, &mut stmt)?;
        }
        Ok(rows_affected)
    }

    fn scalar(&mut self, command: &Command) -> Result<Option<Value>> {
        let conn = self.handle()?;
        let mut batch = Batch::new(conn, &command.text);
        let mut scalar: Option<Option<Value>> = None;

        while let Some(mut stmt) = batch.next()? {
            bind_parameters(&mut stmt, &command.parameters)?;
            if scalar.is_some() || stmt.column_count() == 0 {
                run_to_completion(conn, &mut stmt)?;
                continue;
            }

            let mut rows = stmt.raw_query();
            let first = match rows.next()? {
                Some(row) => Some(Value::from_value_ref(row.get_ref(0)?)),
                None => None,
            };
            while rows.next()?.is_some() {}
            scalar = Some(first);
        }

        Ok(scalar.flatten())
    }
}

/// Bind every parameter the statement mentions. SQLite leaves the rest NULL.
fn bind_parameters(stmt: &mut Statement<'_>, parameters: &[Binding]) -> SqliteResult<()> {
    for parameter in parameters {
        if let Some(idx) = stmt.parameter_index(&parameter.name)? {
            stmt.raw_bind_parameter(idx, &parameter.value)?;
        }
    }
    Ok(())
}

/// Run a statement, discarding any rows. Returns the rows it changed.
///
/// `sqlite3_changes` keeps the last DML count across DDL statements, so the
/// count is taken from the connection total instead.
fn run_to_completion(conn: &Connection, stmt: &mut Statement<'_>) -> SqliteResult<u64> {
    let before = conn.total_changes();
    if stmt.column_count() == 0 {
        stmt.raw_execute()?;
    } else {
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
    }
    Ok(conn.total_changes().saturating_sub(before))
}

const DATA_SOURCE: &str = "data source=";

fn database_path(connection_string: &str) -> &str {
    let cs = connection_string.trim();
    let path = if let Some(rest) = cs
        .strip_prefix("sqlite://")
        .or_else(|| cs.strip_prefix("sqlite:"))
    {
        rest
    } else if cs
        .get(..DATA_SOURCE.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(DATA_SOURCE))
    {
        cs[DATA_SOURCE.len()..].split(';').next().unwrap_or_default().trim()
    } else {
        cs
    };

    if path.is_empty() {
        ":memory:"
    } else {
        path
    }
}

/// Factory for the `sqlite` provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFactory;

impl ConnectionFactory for SqliteFactory {
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DbConnection>> {
        Ok(Box::new(SqliteConnection::new(connection_string)))
    }
}
