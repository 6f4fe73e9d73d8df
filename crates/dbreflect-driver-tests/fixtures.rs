//! Shared fixtures: a seeded server per backend.
//!
//! Both backends get the same three tables in their default catalog plus one
//! extra catalog holding an `items` table:
//!
//! - `users`: single-column key `id`
//! - `order_lines`: composite key `(order_id, line_no)`
//! - `audit_log`: no primary key

use crate::test_containers::{RunningContainer, start_mysql, start_postgres};
use anyhow::{Context, Result};
use dbreflect_core::{
    ConnectionConfig, Connector, PrimaryKeyPolicy, RetryPolicy, SchemaDriver,
};
use dbreflect_drivers::mysql::{MySqlConnector, MySqlDriver};
use dbreflect_drivers::postgres::{PostgresConnector, PostgresDriver};
use std::sync::{Arc, Once};
use std::time::Duration;

/// Backend identifier for parameterized tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestBackend {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
}

impl TestBackend {
    /// Schema holding the fixture tables
    pub fn fixture_schema(&self) -> &'static str {
        match self {
            TestBackend::Postgres => "public",
            TestBackend::Mysql => "test",
        }
    }

    /// Catalog created next to the default one
    pub fn extra_catalog(&self) -> &'static str {
        match self {
            TestBackend::Postgres => "inventory",
            TestBackend::Mysql => "billing",
        }
    }

    /// Catalogs the driver must never list
    pub fn system_catalogs(&self) -> &'static [&'static str] {
        match self {
            TestBackend::Postgres => &["template0", "template1"],
            TestBackend::Mysql => &["information_schema", "mysql", "performance_schema", "sys"],
        }
    }

    /// Reported data type of an `INT` column
    pub fn integer_type(&self) -> &'static str {
        match self {
            TestBackend::Postgres => "integer",
            TestBackend::Mysql => "int",
        }
    }
}

const POSTGRES_FIXTURE: &[&str] = &[
    "CREATE TABLE users (id INT PRIMARY KEY, email TEXT)",
    "CREATE TABLE order_lines (order_id INT, line_no INT, quantity INT, PRIMARY KEY (order_id, line_no))",
    "CREATE TABLE audit_log (logged_at TIMESTAMPTZ, message TEXT)",
    "CREATE DATABASE inventory",
];

const POSTGRES_INVENTORY: &[&str] =
    &["CREATE TABLE items (sku VARCHAR(32) PRIMARY KEY, name VARCHAR(100))"];

const MYSQL_FIXTURE: &[&str] = &[
    "CREATE TABLE users (id INT PRIMARY KEY, email TEXT)",
    "CREATE TABLE order_lines (order_id INT, line_no INT, quantity INT, PRIMARY KEY (order_id, line_no))",
    "CREATE TABLE audit_log (logged_at TIMESTAMP NULL, message TEXT)",
    "CREATE DATABASE billing",
    "CREATE TABLE billing.items (sku VARCHAR(32) PRIMARY KEY, name VARCHAR(100))",
];

/// Install a test subscriber once per process; honors `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Retry policy for freshly started containers, which accept TCP before
/// the server is ready
pub fn container_retry() -> RetryPolicy {
    RetryPolicy::new(30, Duration::from_secs(1))
}

/// A running, seeded database server
pub struct TestServer {
    /// Which backend this server runs
    pub backend: TestBackend,
    /// Descriptor pointing at the fixture catalog
    pub config: ConnectionConfig,
    _container: RunningContainer,
}

impl TestServer {
    /// Start a container for `backend` and seed the fixture tables
    pub async fn start(backend: TestBackend) -> Result<Self> {
        init_tracing();
        let (container, config) = match backend {
            TestBackend::Postgres => start_postgres().await?,
            TestBackend::Mysql => start_mysql().await?,
        };
        let server = Self {
            backend,
            config,
            _container: container,
        };
        server.seed().await?;
        Ok(server)
    }

    async fn seed(&self) -> Result<()> {
        match self.backend {
            TestBackend::Postgres => {
                run_statements(&PostgresConnector, &self.config, POSTGRES_FIXTURE).await?;
                let inventory = self.config.with_database("inventory");
                run_statements(&PostgresConnector, &inventory, POSTGRES_INVENTORY).await
            }
            TestBackend::Mysql => {
                run_statements(&MySqlConnector, &self.config, MYSQL_FIXTURE).await
            }
        }
    }

    /// An unconnected driver for this server
    pub fn driver(&self, policy: PrimaryKeyPolicy) -> Arc<dyn SchemaDriver> {
        match self.backend {
            TestBackend::Postgres => Arc::new(
                PostgresDriver::new(self.config.clone(), container_retry())
                    .with_primary_key_policy(policy),
            ),
            TestBackend::Mysql => Arc::new(
                MySqlDriver::new(self.config.clone(), container_retry())
                    .with_primary_key_policy(policy),
            ),
        }
    }

    /// A connected driver with the default primary-key policy
    pub async fn connected_driver(&self) -> Result<Arc<dyn SchemaDriver>> {
        let driver = self.driver(PrimaryKeyPolicy::default());
        driver.connect().await?;
        Ok(driver)
    }
}

/// Wait for the server, then execute `statements` in order on one connection
async fn run_statements(
    connector: &dyn Connector,
    config: &ConnectionConfig,
    statements: &[&str],
) -> Result<()> {
    let retry = container_retry();
    let mut attempt = 0;
    let conn = loop {
        match connector.open(config).await {
            Ok(conn) => break conn,
            Err(e) if attempt < retry.max_retries => {
                attempt += 1;
                tracing::debug!(attempt, error = %e, "fixture server not ready");
                tokio::time::sleep(retry.backoff()).await;
            }
            Err(e) => return Err(e).context("fixture server never became ready"),
        }
    };

    for statement in statements {
        conn.query(statement, &[])
            .await
            .with_context(|| format!("fixture statement failed: {}", statement))?;
    }
    conn.close().await?;
    Ok(())
}
