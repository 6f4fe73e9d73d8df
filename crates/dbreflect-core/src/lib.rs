//! dbreflect Core - Core abstractions for dialect-agnostic schema reflection
//!
//! This crate provides the traits and types that the backend driver crates
//! implement and that callers program against. It defines:
//!
//! - `SchemaDriver` - The uniform capability contract every dialect implements
//! - `Connector` / `CatalogConnection` - The seam to the SQL execution engine
//! - `ConnectionManager` - Connection lifecycle with bounded, fixed-interval retry
//! - `ColumnInfo` / `Table` - The reflected metadata model
//! - `ReflectConfig` - Descriptors, retry policy and primary-key policy

mod config;
mod connection;
mod driver;
mod error;
pub mod inventory;
mod lifecycle;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod reflect;
mod schema;
mod types;

pub use config::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use inventory::{CatalogReflection, reflect_catalogs};
pub use lifecycle::*;
pub use reflect::PrimaryKeyPolicy;
pub use schema::*;
pub use types::*;
