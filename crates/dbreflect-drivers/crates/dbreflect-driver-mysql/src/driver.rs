//! MySQL driver implementation

use crate::connection::MySqlConnector;
use crate::queries;
use async_trait::async_trait;
use dbreflect_core::reflect::{scan_columns, scan_names};
use dbreflect_core::{
    CatalogConnection, ConnectionConfig, ConnectionManager, ConnectionState, Connector,
    PrimaryKeyPolicy, ReflectConfig, Result, RetryPolicy, SchemaDriver, Table, Value,
};
use std::sync::Arc;

/// MySQL/MariaDB schema driver
pub struct MySqlDriver {
    manager: ConnectionManager,
    primary_key_policy: PrimaryKeyPolicy,
}

impl MySqlDriver {
    /// Create a driver that connects with mysql_async
    pub fn new(config: ConnectionConfig, retry: RetryPolicy) -> Self {
        Self::with_connector(config, retry, Arc::new(MySqlConnector))
    }

    /// Create a driver on top of an arbitrary connector
    pub fn with_connector(
        config: ConnectionConfig,
        retry: RetryPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        tracing::debug!(host = %config.host, database = %config.database, "MySQL driver created");
        Self {
            manager: ConnectionManager::new("mysql", connector, config, retry),
            primary_key_policy: PrimaryKeyPolicy::default(),
        }
    }

    /// Driver for the `[mysql]` descriptor of a loaded configuration
    pub fn from_settings(settings: &ReflectConfig) -> Self {
        Self::new(settings.mysql.clone(), settings.retry)
            .with_primary_key_policy(settings.primary_key_policy)
    }

    pub fn with_primary_key_policy(mut self, policy: PrimaryKeyPolicy) -> Self {
        self.primary_key_policy = policy;
        self
    }

    pub fn primary_key_policy(&self) -> PrimaryKeyPolicy {
        self.primary_key_policy
    }

    pub fn attempts(&self) -> u32 {
        self.manager.attempts()
    }

    async fn reflect_schema(&self, schema: &str) -> Result<Vec<Table>> {
        let conn = self.manager.require_handle()?;
        let conn = conn.as_ref();

        let rows = conn.query(queries::LIST_TABLES, &[Value::from(schema)]).await?;
        let names = scan_names(&rows)?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let params = [Value::from(schema), Value::from(name.as_str())];
            let keys = scan_names(&conn.query(queries::PRIMARY_KEY_COLUMNS, &params).await?)?;
            let columns = conn
                .query(queries::COLUMNS, &params)
                .await
                .and_then(|rows| scan_columns(&rows, &keys, self.primary_key_policy))
                .inspect_err(|e| tracing::warn!(schema, table = %name, error = %e, "failed to reflect columns"))?;
            tables.push(Table::new(name, columns));
        }
        tracing::debug!(schema, tables = tables.len(), "schema reflected");
        Ok(tables)
    }
}

#[async_trait]
impl SchemaDriver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
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
        let mut names = scan_names(&rows)?;
        names.retain(|name| !queries::is_system_schema(name));
        Ok(names)
    }

    /// An empty `schema` reflects the descriptor's database
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: &str) -> Result<Vec<Table>> {
        let schema = if schema.is_empty() {
            self.manager.config().database.as_str()
        } else {
            schema
        };
        self.reflect_schema(schema).await
    }

    /// MySQL catalogs are schemas, so `catalog` is reflected on the existing
    /// connection and `schema` is not consulted.
    #[tracing::instrument(skip(self))]
    async fn list_tables_in_catalog(&self, catalog: &str, schema: &str) -> Result<Vec<Table>> {
        if !schema.is_empty() && schema != catalog {
            tracing::debug!(catalog, schema, "schema argument ignored for MySQL catalogs");
        }
        self.list_tables(catalog).await
    }

    async fn close(&self) -> Result<()> {
        self.manager.close().await
    }
}
