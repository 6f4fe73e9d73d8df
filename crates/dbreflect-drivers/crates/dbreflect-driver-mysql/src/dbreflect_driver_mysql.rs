//! MySQL/MariaDB driver for dbreflect
//!
//! Catalogs are MySQL schemas (databases); all reflection runs through
//! `information_schema` on the single driver connection.

mod connection;
mod driver;
pub mod queries;

#[cfg(test)]
mod driver_tests;

pub use connection::{MySqlConnection, MySqlConnector};
pub use driver::MySqlDriver;
