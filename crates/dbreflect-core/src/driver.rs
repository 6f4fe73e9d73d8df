//! Dialect driver trait definition

use crate::{CatalogConnection, ConnectionConfig, ConnectionState, Result, Table};
use async_trait::async_trait;
use std::sync::Arc;

/// Uniform capability contract implemented once per backend family.
///
/// A driver owns one descriptor and at most one live connection. Reflection
/// calls are issued strictly in sequence; each catalog query is awaited before
/// the next one starts.
#[async_trait]
pub trait SchemaDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "postgres", "mysql")
    fn name(&self) -> &'static str;

    /// Human-readable name (e.g., "PostgreSQL", "MySQL")
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// The descriptor this driver connects with
    fn config(&self) -> &ConnectionConfig;

    /// Current lifecycle state
    fn state(&self) -> ConnectionState;

    /// Open and verify a connection, retrying with fixed backoff.
    ///
    /// Calling it again reconnects; the previous handle is closed first.
    async fn connect(&self) -> Result<()>;

    /// The live connection handle, `None` until connected
    fn raw_handle(&self) -> Option<Arc<dyn CatalogConnection>>;

    /// List catalogs, excluding the dialect's system catalogs
    async fn list_catalogs(&self) -> Result<Vec<String>>;

    /// Reflect every table of `schema` in the connected catalog
    async fn list_tables(&self, schema: &str) -> Result<Vec<Table>>;

    /// Reflect every table of `schema` inside `catalog`
    async fn list_tables_in_catalog(&self, catalog: &str, schema: &str) -> Result<Vec<Table>>;

    /// Release the live connection
    async fn close(&self) -> Result<()>;
}
