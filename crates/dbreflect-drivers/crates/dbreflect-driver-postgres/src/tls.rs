//! PostgreSQL TLS support

use dbreflect_core::{ReflectError, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

/// Build the TLS connector used for `prefer` and `require` modes.
///
/// Neither mode verifies the server certificate or hostname, matching libpq
/// semantics when no root certificate is configured.
pub(crate) fn make_tls_connector() -> Result<MakeTlsConnector> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| ReflectError::Connection(format!("Failed to build TLS connector: {}", e)))?;
    Ok(MakeTlsConnector::new(connector))
}
