//! Provider resolution.
//!
//! A provider identifier (e.g. `"sqlite"`) names a factory that turns a
//! connection string into a fresh, closed [`DbConnection`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::DbConnection;
use crate::error::{RepositoryError, Result};
use crate::sqlite::SqliteFactory;

/// Provider used when a configuration entry does not name one.
pub const DEFAULT_PROVIDER: &str = "sqlite";

/// Creates physical connections for one provider.
pub trait ConnectionFactory: Send + Sync {
    /// Create a connection in the `Closed` state.
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DbConnection>>;
}

/// Provider identifier → factory.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ConnectionFactory>>,
}

impl ProviderRegistry {
    /// A registry with no providers at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `provider`.
    pub fn register(&mut self, provider: &str, factory: Arc<dyn ConnectionFactory>) {
        self.factories.insert(provider.to_string(), factory);
    }

    pub fn with(mut self, provider: &str, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.register(provider, factory);
        self
    }

    pub fn resolve(&self, provider: &str) -> Result<Arc<dyn ConnectionFactory>> {
        self.factories.get(provider).cloned().ok_or_else(|| {
            RepositoryError::ConnectionError(format!("Unknown provider '{}'", provider))
        })
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.factories.contains_key(provider)
    }
}

impl Default for ProviderRegistry {
    /// The bundled SQLite provider.
    fn default() -> Self {
        Self::empty().with(DEFAULT_PROVIDER, Arc::new(SqliteFactory))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;

    #[test]
    fn test_default_registry_has_sqlite() {
        let registry = ProviderRegistry::default();
        assert!(registry.contains(DEFAULT_PROVIDER));

        let conn = registry
            .resolve("sqlite")
            .unwrap()
            .create_connection("sqlite::memory:")
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_unknown_provider_is_connection_error() {
        let err = ProviderRegistry::default()
            .resolve("System.Data.SqlClient")
            .err()
            .unwrap();
        assert!(matches!(err, RepositoryError::ConnectionError(_)));
    }

    #[test]
    fn test_empty_registry() {
        assert!(ProviderRegistry::empty().resolve("sqlite").is_err());
    }
}
