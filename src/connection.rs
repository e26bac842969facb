//! The raw driver seam.
//!
//! A [`DbConnection`] is one physical connection. It knows how to open and
//! close itself and how to run a bound [`Command`]; everything above it
//! (scoping, binding, mapping) lives in this crate.

use std::fmt;

use crate::binder::{Binding, Bindings};
use crate::error::Result;
use crate::value::Value;

/// Live state of a physical connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    /// The connection failed after opening and must be closed before reuse.
    Broken,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Broken => write!(f, "Broken"),
        }
    }
}

/// Statement text with its bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub text: String,
    pub parameters: Bindings,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Bindings::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Bindings) -> Self {
        self.parameters = parameters;
        self
    }

    /// Look up a bound parameter by its placeholder name (`@` included).
    pub fn parameter(&self, name: &str) -> Option<&Binding> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Consumer of a forward-only cursor.
///
/// `columns` is called once before the first row; `row` once per row in
/// cursor order. Returning an error stops the read.
pub trait RowSink {
    fn columns(&mut self, names: &[String]) -> Result<()>;
    fn row(&mut self, values: &[Value]) -> Result<()>;
}

/// One physical database connection.
pub trait DbConnection {
    fn connection_string(&self) -> &str;

    fn state(&self) -> ConnectionState;

    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Run a read statement, draining its cursor into `sink`.
    fn query(&mut self, command: &Command, sink: &mut dyn RowSink) -> Result<()>;

    /// Run a write statement and return the driver-reported affected-row count.
    fn execute(&mut self, command: &Command) -> Result<u64>;

    /// Run a statement and return the first column of its first row, if any.
    fn scalar(&mut self, command: &Command) -> Result<Option<Value>>;
}

impl fmt::Debug for dyn DbConnection + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnection")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
