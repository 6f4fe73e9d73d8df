//! PostgreSQL driver implementation

use crate::connection::PostgresConnector;
use crate::queries;
use async_trait::async_trait;
use dbreflect_core::reflect::{scan_columns, scan_names};
use dbreflect_core::{
    CatalogConnection, ColumnInfo, ConnectionConfig, ConnectionManager, ConnectionState,
    Connector, PrimaryKeyPolicy, ReflectConfig, Result, RetryPolicy, SchemaDriver, Table, Value,
};
use std::sync::Arc;

/// Schema reflected when the caller passes an empty name
pub const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL schema driver
pub struct PostgresDriver {
    manager: ConnectionManager,
    primary_key_policy: PrimaryKeyPolicy,
}

impl PostgresDriver {
    /// Create a driver that connects with tokio-postgres
    pub fn new(config: ConnectionConfig, retry: RetryPolicy) -> Self {
        Self::with_connector(config, retry, Arc::new(PostgresConnector))
    }

    /// Create a driver on top of an arbitrary connector
    pub fn with_connector(
        config: ConnectionConfig,
        retry: RetryPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        tracing::debug!(host = %config.host, database = %config.database, "PostgreSQL driver created");
        Self {
            manager: ConnectionManager::new("postgres", connector, config, retry),
            primary_key_policy: PrimaryKeyPolicy::default(),
        }
    }

    /// Driver for the `[postgres]` descriptor of a loaded configuration
    pub fn from_settings(settings: &ReflectConfig) -> Self {
        Self::new(settings.postgres.clone(), settings.retry)
            .with_primary_key_policy(settings.primary_key_policy)
    }

    pub fn with_primary_key_policy(mut self, policy: PrimaryKeyPolicy) -> Self {
        self.primary_key_policy = policy;
        self
    }

    pub fn primary_key_policy(&self) -> PrimaryKeyPolicy {
        self.primary_key_policy
    }

    /// Failed attempts counted by the most recent `connect`
    pub fn attempts(&self) -> u32 {
        self.manager.attempts()
    }
}

fn resolve_schema(schema: &str) -> &str {
    if schema.is_empty() { DEFAULT_SCHEMA } else { schema }
}

#[async_trait]
impl SchemaDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn config(&self) -> &ConnectionConfig {
        self.manager.config()
    }

    fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    fn raw_handle(&self) -> Option<Arc<dyn CatalogConnection>> {
        self.manager.handle()
    }

    #[tracing::instrument(skip(self))]
    async fn list_catalogs(&self) -> Result<Vec<String>> {
        let conn = self.manager.require_handle()?;
        let rows = conn.query(queries::LIST_DATABASES, &[]).await?;
        scan_names(&rows)
    }

    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<Table>> {
        let conn = self.manager.require_handle()?;
        reflect_schema(conn.as_ref(), resolve_schema(schema), self.primary_key_policy).await
    }

    /// Reflect a schema of another database on the same server.
    ///
    /// A PostgreSQL session is bound to one database, so this opens a
    /// short-lived connection to `catalog` and closes it afterwards whatever
    /// the outcome. The driver's own descriptor and handle are not touched.
    #[tracing::instrument(skip(self))]
    async fn list_tables_in_catalog(&self, catalog: &str, schema: &str) -> Result<Vec<Table>> {
        let target = if catalog.is_empty() {
            self.manager.config().clone()
        } else {
            self.manager.config().with_database(catalog)
        };

        let conn = self.manager.open_scoped(&target).await?;
        let result = reflect_schema(conn.as_ref(), resolve_schema(schema), self.primary_key_policy).await;
        if let Err(e) = conn.close().await {
            tracing::warn!(catalog, error = %e, "failed to close catalog connection");
        }
        result
    }

    async fn close(&self) -> Result<()> {
        self.manager.close().await
    }
}

async fn reflect_schema(
    conn: &dyn CatalogConnection,
    schema: &str,
    policy: PrimaryKeyPolicy,
) -> Result<Vec<Table>> {
    let rows = conn.query(queries::LIST_TABLES, &[Value::from(schema)]).await?;
    let names = scan_names(&rows)?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns = reflect_columns(conn, schema, &name, policy)
            .await
            .inspect_err(|e| tracing::warn!(schema, table = %name, error = %e, "failed to reflect columns"))?;
        tables.push(Table::new(name, columns));
    }
    tracing::debug!(schema, tables = tables.len(), "schema reflected");
    Ok(tables)
}

async fn primary_keys(conn: &dyn CatalogConnection, schema: &str, table: &str) -> Result<Vec<String>> {
    let rows = conn
        .query(queries::PRIMARY_KEY_COLUMNS, &[Value::from(schema), Value::from(table)])
        .await?;
    scan_names(&rows)
}

async fn reflect_columns(
    conn: &dyn CatalogConnection,
    schema: &str,
    table: &str,
    policy: PrimaryKeyPolicy,
) -> Result<Vec<ColumnInfo>> {
    let keys = primary_keys(conn, schema, table).await?;
    let rows = conn
        .query(queries::COLUMNS, &[Value::from(schema), Value::from(table)])
        .await?;
    scan_columns(&rows, &keys, policy)
}
