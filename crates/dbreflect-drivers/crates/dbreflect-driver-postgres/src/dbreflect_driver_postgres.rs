//! PostgreSQL driver for dbreflect
//!
//! Reflects tables, columns and primary keys through `information_schema`
//! and enumerates catalogs through `pg_database`.

mod connection;
mod driver;
pub mod queries;
mod tls;

#[cfg(test)]
mod driver_tests;

pub use connection::{PostgresConnection, PostgresConnector};
pub use driver::{DEFAULT_SCHEMA, PostgresDriver};
