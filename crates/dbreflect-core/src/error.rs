//! Error types for dbreflect

use thiserror::Error;

/// Core error type for reflection operations
#[derive(Error, Debug)]
pub enum ReflectError {
    /// Opening or pinging the backend failed (surfaced after retries are exhausted)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A catalog query failed
    #[error("Query error: {0}")]
    Query(String),

    /// A row could not be decoded into the expected shape
    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Not connected: call connect() before reflecting")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReflectError {
    /// Whether this error came from establishing a connection
    pub fn is_connection(&self) -> bool {
        matches!(self, ReflectError::Connection(_))
    }

    /// Re-tag any error as a connection error, keeping its message.
    ///
    /// Failures while opening or pinging are always reported as `Connection`,
    /// whatever layer produced them.
    pub fn into_connection(self) -> Self {
        match self {
            ReflectError::Connection(_) => self,
            other => ReflectError::Connection(other.to_string()),
        }
    }
}

/// Result type alias for reflection operations
pub type Result<T> = std::result::Result<T, ReflectError>;
