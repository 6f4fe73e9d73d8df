//! dbreflect Drivers - Concrete schema drivers and backend selection
//!
//! This crate re-exports the dialect driver crates and provides the factory
//! that maps a backend key onto a ready-to-connect `SchemaDriver`.

pub use dbreflect_driver_mysql as mysql;
pub use dbreflect_driver_postgres as postgres;

mod registry;

pub use registry::{Backend, UnknownBackend, create_driver, create_driver_for};

/// Re-export commonly used types from dbreflect-core
pub use dbreflect_core::{
    CatalogReflection, ColumnInfo, ConnectionConfig, ConnectionState, PrimaryKeyPolicy,
    ReflectConfig, ReflectError, Result, RetryPolicy, SchemaDriver, Table, reflect_catalogs,
};
