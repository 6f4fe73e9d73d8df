//! Docker container management for integration tests.
//!
//! Each call starts a fresh container; it is removed when the returned
//! handle is dropped.

use anyhow::Result;
use dbreflect_core::ConnectionConfig;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::{mysql::Mysql, postgres::Postgres};

/// A running database container
pub enum RunningContainer {
    /// PostgreSQL module image (user, password and database all `postgres`)
    Postgres(ContainerAsync<Postgres>),
    /// MySQL module image (user `root`, empty password, database `test`)
    Mysql(ContainerAsync<Mysql>),
}

/// Start a PostgreSQL container and return it with a descriptor pointing at it
pub async fn start_postgres() -> Result<(RunningContainer, ConnectionConfig)> {
    tracing::info!("starting PostgreSQL test container");
    let container = Postgres::default().start().await?;
    let host = container.get_host().await?.to_string();
    let port = container.get_host_port_ipv4(5432).await?;

    let config = ConnectionConfig::new(&host, port, "postgres", "postgres").with_password("postgres");
    tracing::info!(host = %host, port, "PostgreSQL test container ready");
    Ok((RunningContainer::Postgres(container), config))
}

/// Start a MySQL container and return it with a descriptor pointing at it
pub async fn start_mysql() -> Result<(RunningContainer, ConnectionConfig)> {
    tracing::info!("starting MySQL test container");
    let container = Mysql::default().start().await?;
    let host = container.get_host().await?.to_string();
    let port = container.get_host_port_ipv4(3306).await?;

    let config = ConnectionConfig::new(&host, port, "test", "root");
    tracing::info!(host = %host, port, "MySQL test container ready");
    Ok((RunningContainer::Mysql(container), config))
}
