//! Backend keys and the driver factory

use crate::mysql::MySqlDriver;
use crate::postgres::PostgresDriver;
use dbreflect_core::{ReflectConfig, SchemaDriver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported backend families
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    MySql,
}

/// A backend key that names no known backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend '{0}' (expected one of: postgres, postgresql, pg, mysql, mariadb)")]
pub struct UnknownBackend(pub String);

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Postgres, Backend::MySql];

    /// Strict lookup: aliases are case-insensitive and surrounding whitespace
    /// is ignored
    pub fn parse(key: &str) -> Result<Self, UnknownBackend> {
        match key.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Backend::Postgres),
            "mysql" | "mariadb" => Ok(Backend::MySql),
            _ => Err(UnknownBackend(key.to_string())),
        }
    }

    /// Lenient lookup: anything unrecognized selects Postgres
    pub fn from_key(key: &str) -> Self {
        Self::parse(key).unwrap_or_else(|err| {
            tracing::warn!(key, error = %err, "falling back to the postgres driver");
            Backend::Postgres
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Build an unconnected driver for `backend` from the loaded configuration
pub fn create_driver_for(backend: Backend, settings: &ReflectConfig) -> Arc<dyn SchemaDriver> {
    tracing::debug!(%backend, "creating schema driver");
    match backend {
        Backend::Postgres => Arc::new(PostgresDriver::from_settings(settings)),
        Backend::MySql => Arc::new(MySqlDriver::from_settings(settings)),
    }
}

/// Build an unconnected driver from a backend key.
///
/// Unrecognized keys, including the empty string, select the
/// Postgres-flavored driver.
pub fn create_driver(key: &str, settings: &ReflectConfig) -> Arc<dyn SchemaDriver> {
    create_driver_for(Backend::from_key(key), settings)
}
