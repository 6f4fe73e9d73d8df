//! Connection descriptors and reflection settings

use crate::reflect::PrimaryKeyPolicy;
use crate::{ReflectError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// TLS negotiation mode for a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

/// Connection descriptor for one backend.
///
/// Empty strings and a zero port mean "use the dialect default"; each driver
/// resolves them when opening a connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    /// Port number (0 for the dialect default)
    pub port: u16,
    /// Target catalog (database) the connection is bound to
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    /// Per-attempt connect timeout in seconds (0 disables the timeout)
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database: String::new(),
            username: String::new(),
            password: None,
            ssl_mode: SslMode::Disable,
            connect_timeout_secs: 5,
        }
    }
}

impl ConnectionConfig {
    /// Development default for the Postgres-flavored driver
    pub fn postgres_default() -> Self {
        Self::new("127.0.0.1", 5432, "postgres", "postgres").with_password("password")
    }

    /// Development default for the MySQL-flavored driver
    pub fn mysql_default() -> Self {
        Self::new("127.0.0.1", 3306, "users", "root").with_password("password")
    }

    pub fn new(host: &str, port: u16, database: &str, username: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            username: username.to_string(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// Same host and credentials, bound to a different catalog
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..self.clone()
        }
    }

    pub fn port_or(&self, default: u16) -> u16 {
        if self.port > 0 { self.port } else { default }
    }

    pub fn database_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.database.is_empty() {
            default
        } else {
            &self.database
        }
    }

    pub fn username_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.username.is_empty() {
            default
        } else {
            &self.username
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Fixed-interval retry policy for connection establishment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failed attempts tolerated before giving up; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Pause between attempts, in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff_ms: u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Fail on the first error without sleeping
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Top-level settings injected into the driver factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    pub primary_key_policy: PrimaryKeyPolicy,
    pub retry: RetryPolicy,
    pub postgres: ConnectionConfig,
    pub mysql: ConnectionConfig,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            primary_key_policy: PrimaryKeyPolicy::default(),
            retry: RetryPolicy::default(),
            postgres: ConnectionConfig::postgres_default(),
            mysql: ConnectionConfig::mysql_default(),
        }
    }
}

impl ReflectConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| ReflectError::Configuration(format!("Invalid config: {}", e)))
    }

    /// Load settings from a TOML file; omitted keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded reflection config");
        Ok(config)
    }
}
