//! PostgreSQL connection implementation

use crate::tls::make_tls_connector;
use async_trait::async_trait;
use bytes::BytesMut;
use dbreflect_core::{
    CatalogConnection, ConnectionConfig, Connector, ReflectError, Result, Row, SslMode, Value,
};
use postgres_types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row as PgRow};

pub(crate) const DEFAULT_PORT: u16 = 5432;
const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_USER: &str = "postgres";

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match db_error.code().code() {
        "3D000" => format!("database does not exist: {}", message),
        "28P01" | "28000" => format!("authentication failed: {}", message),
        "42501" => format!("permission denied: {}", message),
        code => format!("{} (code: {})", message, code),
    }
}

/// Translate a descriptor into a tokio-postgres config, filling dialect defaults
pub(crate) fn build_pg_config(config: &ConnectionConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host)
        .port(config.port_or(DEFAULT_PORT))
        .dbname(config.database_or(DEFAULT_DATABASE))
        .user(config.username_or(DEFAULT_USER))
        .application_name("dbreflect");

    if let Some(password) = &config.password {
        pg.password(password);
    }
    if let Some(timeout) = config.connect_timeout() {
        pg.connect_timeout(timeout);
    }

    pg.ssl_mode(match config.ssl_mode {
        SslMode::Disable => tokio_postgres::config::SslMode::Disable,
        SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
        SslMode::Require => tokio_postgres::config::SslMode::Require,
    });
    pg
}

fn spawn_connection<S, T>(connection: tokio_postgres::Connection<S, T>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection error");
        }
    });
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Mutex<Option<Client>>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port_or(DEFAULT_PORT),
            database = %config.database_or(DEFAULT_DATABASE),
            ssl_mode = config.ssl_mode.as_str(),
            "connecting to PostgreSQL database"
        );

        let pg_config = build_pg_config(config);
        let connect_error = |e: tokio_postgres::Error| {
            ReflectError::Connection(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        };

        let client = if config.ssl_mode == SslMode::Disable {
            let (client, connection) = pg_config.connect(NoTls).await.map_err(connect_error)?;
            spawn_connection(connection);
            client
        } else {
            let tls = make_tls_connector()?;
            let (client, connection) = pg_config.connect(tls).await.map_err(connect_error)?;
            spawn_connection(connection);
            client
        };

        Ok(Self {
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl CatalogConnection for PostgresConnection {
    async fn ping(&self) -> Result<()> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ReflectError::NotConnected)?;
        client.simple_query("SELECT 1").await.map_err(|e| {
            ReflectError::Connection(format!("PostgreSQL ping failed: {}", format_postgres_error(&e)))
        })?;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| ReflectError::Query("connection is closed".into()))?;

        let statement = client.prepare(sql).await.map_err(|e| {
            ReflectError::Query(format!("Failed to prepare query: {}", format_postgres_error(&e)))
        })?;

        let pg_params: Vec<PgValue> = params.iter().map(PgValue::from_value).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = pg_params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        let rows = client
            .query(&statement, &param_refs)
            .await
            .map_err(|e| ReflectError::Query(format_postgres_error(&e)))?;
        tracing::debug!(rows = rows.len(), "query returned");

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        rows.iter()
            .map(|row| {
                let values = (0..row.len())
                    .map(|idx| postgres_to_value(row, idx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Row::new(columns.clone(), values))
            })
            .collect()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // dropping the client ends the spawned connection task
            self.client.lock().await.take();
            tracing::debug!("PostgreSQL connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens live PostgreSQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn CatalogConnection>> {
        let conn = PostgresConnection::connect(config).await?;
        Ok(Arc::new(conn))
    }
}

/// Bound parameter; the wire encoding follows the statement's parameter type
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl PgValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::String(v) => PgValue::String(v.clone()),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            PgValue::Float64(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            PgValue::String(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Text-like columns, including `name` and domain types over text.
///
/// Other types are rejected so a non-text column surfaces as a scan error
/// instead of its binary encoding.
struct PgText(String);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(PgText(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        match ty.kind() {
            Kind::Domain(inner) => Self::accepts(inner),
            _ => matches!(
                *ty,
                Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::CHAR | Type::UNKNOWN
            ),
        }
    }
}

fn postgres_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let decoded = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Bool)),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(|n| Value::Int64(n.into()))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(|n| Value::Int64(n.into()))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int64)),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map(|v| v.map(|n| Value::Int64(n.into()))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|n| Value::Float64(n.into()))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::Float64)),
        _ => row
            .try_get::<_, Option<PgText>>(idx)
            .map(|v| v.map(|t| Value::String(t.0))),
    };

    decoded
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| ReflectError::Scan(format!("Failed to decode column {}: {}", column.name(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pg_config_fills_dialect_defaults() {
        let config = ConnectionConfig::new("db.internal", 0, "", "");
        let pg = build_pg_config(&config);

        assert_eq!(pg.get_ports(), &[DEFAULT_PORT]);
        assert_eq!(pg.get_dbname(), Some("postgres"));
        assert_eq!(pg.get_user(), Some("postgres"));
        assert_eq!(pg.get_password(), None);
        assert_eq!(pg.get_ssl_mode(), tokio_postgres::config::SslMode::Disable);
    }

    #[test]
    fn test_pg_config_uses_descriptor_values() {
        let config = ConnectionConfig::new("10.0.0.5", 6543, "inventory", "reflector")
            .with_password("s3cret")
            .with_ssl_mode(SslMode::Require);
        let pg = build_pg_config(&config);

        assert_eq!(
            pg.get_hosts(),
            &[tokio_postgres::config::Host::Tcp("10.0.0.5".into())]
        );
        assert_eq!(pg.get_ports(), &[6543]);
        assert_eq!(pg.get_dbname(), Some("inventory"));
        assert_eq!(pg.get_user(), Some("reflector"));
        assert_eq!(pg.get_password(), Some("s3cret".as_bytes()));
        assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(5)));
        assert_eq!(pg.get_ssl_mode(), tokio_postgres::config::SslMode::Require);
    }

    #[test]
    fn test_int_params_narrow_to_column_width() {
        let mut out = BytesMut::new();
        PgValue::Int64(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(PgValue::Int64(i64::MAX).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn test_text_decodes_name_columns() {
        let decoded = PgText::from_sql(&Type::NAME, b"pg_catalog").unwrap();
        assert_eq!(decoded.0, "pg_catalog");
        assert!(<PgText as FromSql>::accepts(&Type::VARCHAR));
    }

    #[test]
    fn test_text_rejects_binary_columns() {
        assert!(!<PgText as FromSql>::accepts(&Type::TIMESTAMP));
        assert!(!<PgText as FromSql>::accepts(&Type::BYTEA));
        assert!(!<PgText as FromSql>::accepts(&Type::UUID));
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        assert!(PgText::from_sql(&Type::TEXT, &[0xff, 0xfe]).is_err());
    }
}
