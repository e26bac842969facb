//! Connection and repository configuration.

use std::collections::HashMap;

use serde::Deserialize;

use crate::binder::CarrierWalk;
use crate::error::{RepositoryError, Result};
use crate::provider::DEFAULT_PROVIDER;

/// A resolved connection string and the provider that understands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub connection_string: String,
    pub provider_name: String,
}

impl ConnectionSettings {
    pub fn new(connection_string: &str, provider_name: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            provider_name: provider_name.to_string(),
        }
    }

    /// Settings for the default provider.
    pub fn with_default_provider(connection_string: &str) -> Self {
        Self::new(connection_string, DEFAULT_PROVIDER)
    }
}

/// One named entry as written in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEntry {
    pub connection_string: String,
    #[serde(default)]
    pub provider_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionStringsFile {
    #[serde(default)]
    connection_strings: HashMap<String, ConnectionEntry>,
}

/// Named connection string entries.
///
/// TOML layout:
///
/// ```toml
/// [connection_strings.main]
/// connection_string = "sqlite://app.db"
/// provider_name = "sqlite"
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionStrings {
    entries: HashMap<String, ConnectionEntry>,
}

impl ConnectionStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConnectionStringsFile = toml::from_str(source)
            .map_err(|e| RepositoryError::ConfigError(e.to_string()))?;
        Ok(Self {
            entries: file.connection_strings,
        })
    }

    pub fn insert(&mut self, name: &str, entry: ConnectionEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    /// Resolve a named entry, defaulting a missing or blank provider.
    pub fn resolve(&self, name: &str) -> Result<ConnectionSettings> {
        let entry = self.entries.get(name).ok_or_else(|| {
            RepositoryError::ConfigError(format!(
                "Can't find a connection string with the name '{}'",
                name
            ))
        })?;

        let provider = entry
            .provider_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROVIDER);

        Ok(ConnectionSettings::new(&entry.connection_string, provider))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Repository behaviour knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryConfig {
    /// How carriers are consumed while binding placeholders
    pub carrier_walk: CarrierWalk,
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the carrier walk policy.
    pub fn carrier_walk(mut self, walk: CarrierWalk) -> Self {
        self.carrier_walk = walk;
        self
    }
}
