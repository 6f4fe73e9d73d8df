//! Seam to the SQL execution engine

use crate::{ConnectionConfig, Result, Row, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A live connection to one catalog of a backend.
///
/// Implementations wrap a concrete client (tokio-postgres, mysql_async) and
/// serialize their own statements, so a handle can be shared behind an `Arc`.
#[async_trait]
pub trait CatalogConnection: Send + Sync {
    /// Round-trip health check
    async fn ping(&self) -> Result<()>;

    /// Execute a parameterized query and collect its rows.
    ///
    /// Placeholders follow the backend dialect (`$1` for Postgres, `?` for MySQL).
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Release the backend-side connection. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Opens connections from a descriptor
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn CatalogConnection>>;
}
