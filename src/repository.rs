//! The repository facade.
//!
//! [`Repository`] is the contract call-sites code against. A backend only
//! supplies `query`, `execute`, `insert` and the connection accessors; the
//! fetch/single/first family and their predicate-filtered forms are
//! defined once here on top of `query`, so every backend shares the same
//! cardinality policy. Predicates run client-side, after the full result
//! set has been read.
//!
//! [`SqlRepository`] is the raw-driver backend: it runs statements through
//! a [`ConnectionScope`], binds placeholders with a [`ParameterBinder`] and
//! materializes rows with a [`RowMapper`].

use std::cell::Ref;
use std::sync::Arc;

use crate::binder::ParameterBinder;
use crate::carrier::Carrier;
use crate::config::{ConnectionSettings, ConnectionStrings, RepositoryConfig};
use crate::connection::{Command, ConnectionState, DbConnection};
use crate::error::{RepositoryError, Result};
use crate::mapper::{FromRow, RowMapper};
use crate::provider::ProviderRegistry;
use crate::scope::{ConnectionScope, ScopeGuard};
use crate::value::{FromValue, Value};

/// Rows of a read, already materialized in cursor order.
pub type Rows<T> = std::vec::IntoIter<T>;

pub trait Repository {
    /// Connection type exposed by [`Repository::current_connection`].
    type Connection: ?Sized;

    /// Run a read statement and materialize every row.
    fn query<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Rows<T>>;

    /// Run a write statement and return the affected-row count.
    fn execute(&self, sql: &str, args: &[&dyn Carrier]) -> Result<u64>;

    /// Run a statement that yields one scalar and coerce it to `T`.
    ///
    /// A missing scalar is treated as NULL, so `Option<_>` targets get `None`.
    fn insert<T: FromValue>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<T>;

    fn current_connection(&self) -> Option<Ref<'_, Self::Connection>>;

    fn connection_state(&self) -> Result<ConnectionState>;

    fn fetch<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Vec<T>> {
        Ok(self.query(sql, args)?.collect())
    }

    fn single<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<T> {
        exactly_one(self.query(sql, args)?)
    }

    fn single_or_default<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Option<T>> {
        at_most_one(self.query(sql, args)?)
    }

    fn first<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<T> {
        self.query(sql, args)?
            .next()
            .ok_or(RepositoryError::EmptyResult)
    }

    fn first_or_default<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Option<T>> {
        Ok(self.query(sql, args)?.next())
    }

    fn fetch_where<T, P>(&self, sql: &str, predicate: P, args: &[&dyn Carrier]) -> Result<Vec<T>>
    where
        T: FromRow,
        P: FnMut(&T) -> bool,
    {
        Ok(self.query(sql, args)?.filter(predicate).collect())
    }

    fn single_where<T, P>(&self, sql: &str, predicate: P, args: &[&dyn Carrier]) -> Result<T>
    where
        T: FromRow,
        P: FnMut(&T) -> bool,
    {
        exactly_one(self.query(sql, args)?.filter(predicate))
    }

    fn single_or_default_where<T, P>(
        &self,
        sql: &str,
        predicate: P,
        args: &[&dyn Carrier],
    ) -> Result<Option<T>>
    where
        T: FromRow,
        P: FnMut(&T) -> bool,
    {
        at_most_one(self.query(sql, args)?.filter(predicate))
    }

    fn first_where<T, P>(&self, sql: &str, mut predicate: P, args: &[&dyn Carrier]) -> Result<T>
    where
        T: FromRow,
        P: FnMut(&T) -> bool,
    {
        self.query(sql, args)?
            .find(|row| predicate(row))
            .ok_or(RepositoryError::EmptyResult)
    }

    fn first_or_default_where<T, P>(
        &self,
        sql: &str,
        mut predicate: P,
        args: &[&dyn Carrier],
    ) -> Result<Option<T>>
    where
        T: FromRow,
        P: FnMut(&T) -> bool,
    {
        Ok(self.query(sql, args)?.find(|row| predicate(row)))
    }
}

/// Exactly one row, counting every row so the error reports the real size.
fn exactly_one<T>(rows: impl Iterator<Item = T>) -> Result<T> {
    at_most_one(rows)?.ok_or(RepositoryError::EmptyResult)
}

fn at_most_one<T>(mut rows: impl Iterator<Item = T>) -> Result<Option<T>> {
    let Some(first) = rows.next() else {
        return Ok(None);
    };
    let extra = rows.count();
    if extra > 0 {
        return Err(RepositoryError::CardinalityError(extra + 1));
    }
    Ok(Some(first))
}

/// Repository over a raw driver connection.
///
/// Built from a named configuration entry, from explicit settings, or from
/// a caller-owned connection that stays pinned open for the repository's
/// lifetime. Not safe to share between threads (`!Sync`).
pub struct SqlRepository<'c> {
    scope: ConnectionScope<'c>,
    binder: ParameterBinder,
}

impl SqlRepository<'static> {
    /// Repository that opens its own connections from `settings`.
    pub fn new(settings: ConnectionSettings, providers: Arc<ProviderRegistry>) -> Self {
        Self::with_config(settings, providers, RepositoryConfig::default())
    }

    pub fn with_config(
        settings: ConnectionSettings,
        providers: Arc<ProviderRegistry>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            scope: ConnectionScope::owned(settings, providers),
            binder: ParameterBinder::new(config.carrier_walk),
        }
    }

    /// Repository for a named connection string entry.
    pub fn from_config(
        strings: &ConnectionStrings,
        name: &str,
        providers: Arc<ProviderRegistry>,
        config: RepositoryConfig,
    ) -> Result<Self> {
        let settings = strings.resolve(name)?;
        Ok(Self::with_config(settings, providers, config))
    }

    /// Repository over a connection string for the bundled SQLite provider.
    pub fn sqlite(connection_string: &str) -> Self {
        Self::new(
            ConnectionSettings::with_default_provider(connection_string),
            Arc::new(ProviderRegistry::default()),
        )
    }
}

impl<'c> SqlRepository<'c> {
    /// Repository pinned to a caller-owned, already open connection.
    pub fn with_connection(conn: &'c mut dyn DbConnection) -> Self {
        Self::with_connection_config(conn, RepositoryConfig::default())
    }

    pub fn with_connection_config(conn: &'c mut dyn DbConnection, config: RepositoryConfig) -> Self {
        Self {
            scope: ConnectionScope::borrowed(conn),
            binder: ParameterBinder::new(config.carrier_walk),
        }
    }

    pub fn scope(&self) -> &ConnectionScope<'c> {
        &self.scope
    }

    /// Keep the connection open across several operations.
    ///
    /// Operations issued while the returned guard is alive share one
    /// physical connection; it closes when the guard drops.
    pub fn hold(&self) -> Result<ScopeGuard<'_, 'c>> {
        self.scope.acquire()
    }

    fn command(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Command> {
        let parameters = self.binder.bind(sql, args)?;
        Ok(Command::new(sql).with_parameters(parameters))
    }
}

impl<'c> Repository for SqlRepository<'c> {
    type Connection = dyn DbConnection + 'c;

    fn query<T: FromRow>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<Rows<T>> {
        let guard = self.scope.acquire()?;
        let command = self.command(sql, args)?;

        // Drain fully before the guard drops: closing invalidates the cursor.
        let mut mapper = RowMapper::<T>::new();
        guard.connection()?.query(&command, &mut mapper)?;
        Ok(mapper.into_rows().into_iter())
    }

    fn execute(&self, sql: &str, args: &[&dyn Carrier]) -> Result<u64> {
        let guard = self.scope.acquire()?;
        let command = self.command(sql, args)?;
        let rows_affected = guard.connection()?.execute(&command)?;
        Ok(rows_affected)
    }

    fn insert<T: FromValue>(&self, sql: &str, args: &[&dyn Carrier]) -> Result<T> {
        let guard = self.scope.acquire()?;
        let command = self.command(sql, args)?;
        let scalar = guard.connection()?.scalar(&command)?;
        T::from_value(&scalar.unwrap_or(Value::Null))
    }

    fn current_connection(&self) -> Option<Ref<'_, Self::Connection>> {
        self.scope.connection()
    }

    fn connection_state(&self) -> Result<ConnectionState> {
        self.scope.current_state()
    }
}
