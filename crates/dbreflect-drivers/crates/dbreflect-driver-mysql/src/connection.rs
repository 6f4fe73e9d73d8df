//! MySQL connection implementation

use async_trait::async_trait;
use dbreflect_core::{
    CatalogConnection, ConnectionConfig, Connector, ReflectError, Result, Row, SslMode, Value,
};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Row as MySqlRow, SslOpts};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

pub(crate) const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";

/// Translate a descriptor into mysql_async options, filling dialect defaults
pub(crate) fn build_opts(config: &ConnectionConfig) -> Opts {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port_or(DEFAULT_PORT))
        .user(Some(config.username_or(DEFAULT_USER)))
        .prefer_socket(false);

    if !config.database.is_empty() {
        builder = builder.db_name(Some(config.database.clone()));
    }
    if let Some(password) = &config.password {
        builder = builder.pass(Some(password.clone()));
    }
    // mysql_async has no opportunistic mode; only `require` negotiates TLS
    if config.ssl_mode == SslMode::Require {
        builder = builder.ssl_opts(Some(
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true),
        ));
    }
    builder.into()
}

/// MySQL connection wrapper
pub struct MySqlConnection {
    conn: Mutex<Option<Conn>>,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect to a MySQL database
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port_or(DEFAULT_PORT),
            database = %config.database,
            ssl_mode = config.ssl_mode.as_str(),
            "connecting to MySQL database"
        );

        let opts = build_opts(config);
        let pending = Conn::new(opts);
        let conn = match config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                ReflectError::Connection(format!(
                    "Timed out connecting to MySQL after {}s",
                    limit.as_secs()
                ))
            })?,
            None => pending.await,
        }
        .map_err(|e| ReflectError::Connection(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        })
    }
}

fn value_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(i64::from(*v)),
        Value::Int64(v) => mysql_async::Value::Int(*v),
        Value::Float64(v) => mysql_async::Value::Double(*v),
        Value::String(v) => mysql_async::Value::Bytes(v.as_bytes().to_vec()),
    }
}

/// Convert a mysql_async value, using the column type to interpret text
/// protocol byte strings. Byte strings that are not UTF-8 are a scan error.
fn mysql_value_to_value(val: &mysql_async::Value, col_type: ColumnType) -> Result<Value> {
    let value = match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => {
            let s = String::from_utf8(bytes.clone())
                .map_err(|e| ReflectError::Scan(format!("column holds invalid UTF-8: {}", e)))?;
            match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => {
                    s.parse::<i64>().map(Value::Int64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                _ => Value::String(s),
            }
        }
        mysql_async::Value::Int(i) => Value::Int64(*i),
        mysql_async::Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::String(u.to_string()),
        },
        mysql_async::Value::Float(f) => Value::Float64(f64::from(*f)),
        mysql_async::Value::Double(d) => Value::Float64(*d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            if *hour == 0 && *min == 0 && *sec == 0 && *micro == 0 {
                Value::String(format!("{:04}-{:02}-{:02}", year, month, day))
            } else {
                Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                ))
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = u32::from(*days) * 24 + u32::from(*hours);
            let sign = if *negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    };
    Ok(value)
}

fn convert_row(row: &MySqlRow) -> Result<Row> {
    let columns_ref = row.columns_ref();
    let columns = columns_ref
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let values = columns_ref
        .iter()
        .enumerate()
        .map(|(idx, col)| match row.as_ref(idx) {
            Some(v) => mysql_value_to_value(v, col.column_type()),
            None => Ok(Value::Null),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

#[async_trait]
impl CatalogConnection for MySqlConnection {
    async fn ping(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ReflectError::NotConnected)?;
        conn.ping()
            .await
            .map_err(|e| ReflectError::Connection(format!("MySQL ping failed: {}", e)))
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ReflectError::Query("connection is closed".into()))?;

        let rows: Vec<MySqlRow> = if params.is_empty() {
            conn.query::<MySqlRow, _>(sql).await
        } else {
            let positional: Vec<mysql_async::Value> = params.iter().map(value_to_mysql).collect();
            conn.exec::<MySqlRow, _, _>(sql, Params::Positional(positional)).await
        }
        .map_err(|e| ReflectError::Query(format!("Failed to execute query: {}", e)))?;

        tracing::debug!(rows = rows.len(), "query returned");
        rows.iter().map(convert_row).collect()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        conn.disconnect()
            .await
            .map_err(|e| ReflectError::Connection(format!("Failed to disconnect from MySQL: {}", e)))?;
        tracing::debug!("MySQL connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens live MySQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl Connector for MySqlConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn CatalogConnection>> {
        let conn = MySqlConnection::connect(config).await?;
        Ok(Arc::new(conn))
    }
}
