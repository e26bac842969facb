//! repokit - one repository contract over raw database connections.
//!
//! ```
//! use repokit::{params, from_row, Repository, SqlRepository};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//! from_row!(User { id, name });
//!
//! let mut conn = repokit::sqlite::SqliteConnection::open_new("sqlite::memory:")?;
//! let repo = SqlRepository::with_connection(&mut conn);
//! repo.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[])?;
//! repo.execute("INSERT INTO users (name) VALUES (@name)", &[&params! { name: "ada" }])?;
//!
//! let user: User = repo.single("SELECT * FROM users WHERE id = @id", &[&params! { id: 1 }])?;
//! assert_eq!(user.name, "ada");
//! # Ok::<(), repokit::RepositoryError>(())
//! ```

pub mod binder;
pub mod carrier;
pub mod config;
pub mod connection;
pub mod error;
pub mod mapper;
pub mod provider;
pub mod repository;
pub mod scope;
pub mod sqlite;
pub mod value;

pub use binder::{Binding, CarrierWalk, ParameterBinder};
pub use carrier::{Carrier, Params};
pub use config::{ConnectionEntry, ConnectionSettings, ConnectionStrings, RepositoryConfig};
pub use connection::{Command, ConnectionState, DbConnection, RowSink};
pub use error::{RepositoryError, Result};
pub use mapper::{Field, FromRow, RowMapper};
pub use provider::{ConnectionFactory, ProviderRegistry, DEFAULT_PROVIDER};
pub use repository::{Repository, Rows, SqlRepository};
pub use scope::{ConnectionScope, ScopeGuard};
pub use value::{FromValue, JsonValue, Value};
