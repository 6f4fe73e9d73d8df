//! dbreflect driver integration suite
//!
//! Runs the PostgreSQL and MySQL drivers against real servers started in
//! Docker with testcontainers. Every test that needs a container is marked
//! `#[ignore]`; run them with:
//!
//! ```bash
//! cargo test -p dbreflect-driver-tests -- --ignored
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixtures;
pub mod test_containers;

#[cfg(test)]
mod connection_tests;

#[cfg(test)]
mod reflection_tests;
