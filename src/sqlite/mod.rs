//! Bundled SQLite driver.
//!
//! A blocking `rusqlite` connection behind the [`DbConnection`](crate::DbConnection)
//! seam, registered as the `sqlite` provider.

pub mod connection;
pub mod error;
pub mod types;


pub use connection::{SqliteConnection, SqliteFactory};
pub use error::{SqliteError, SqliteResult};
