//! Scripted in-memory connector for unit tests.
//!
//! A `MockConnector` answers every query through a responder closure and
//! records opens, closes and queries so tests can assert on connection
//! bookkeeping (retries, scoped connections, release on reconnect).

use crate::{CatalogConnection, ConnectionConfig, Connector, ReflectError, Result, Row, Value};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// A query as seen by the responder
#[derive(Debug, Clone, PartialEq)]
pub struct MockQuery {
    /// Catalog the issuing connection was opened against
    pub database: String,
    pub sql: String,
    pub params: Vec<Value>,
}

impl MockQuery {
    /// The n-th bound parameter as text, or "" when absent
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).and_then(|v| v.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Opened { id: usize, database: String },
    Closed { id: usize, database: String },
}

type Responder = dyn Fn(&MockQuery) -> Result<Vec<Row>> + Send + Sync;

struct Shared {
    responder: Box<Responder>,
    failing_opens: AtomicU32,
    failing_pings: AtomicU32,
    open_attempts: AtomicUsize,
    next_id: AtomicUsize,
    events: Mutex<Vec<MockEvent>>,
    queries: Mutex<Vec<MockQuery>>,
}

/// Connector backed by a responder closure
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn new(responder: impl Fn(&MockQuery) -> Result<Vec<Row>> + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                responder: Box::new(responder),
                failing_opens: AtomicU32::new(0),
                failing_pings: AtomicU32::new(0),
                open_attempts: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Every query returns no rows
    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Every open fails
    pub fn unreachable() -> Self {
        Self::empty().fail_opens(u32::MAX)
    }

    /// Fail the next `n` opens with a connection error
    pub fn fail_opens(self, n: u32) -> Self {
        self.shared.failing_opens.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` pings
    pub fn fail_pings(self, n: u32) -> Self {
        self.shared.failing_pings.store(n, Ordering::SeqCst);
        self
    }

    /// Calls to `open`, successful or not
    pub fn open_attempts(&self) -> usize {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.events.lock().clone()
    }

    pub fn queries(&self) -> Vec<MockQuery> {
        self.shared.queries.lock().clone()
    }

    /// Opened connections not yet closed
    pub fn live_connections(&self) -> usize {
        self.shared
            .events
            .lock()
            .iter()
            .fold(0isize, |live, event| match event {
                MockEvent::Opened { .. } => live + 1,
                MockEvent::Closed { .. } => live - 1,
            })
            .max(0) as usize
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
            0 => None,
            u32::MAX => Some(u32::MAX),
            n => Some(n - 1),
        })
        .is_ok()
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn CatalogConnection>> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.shared.failing_opens) {
            return Err(ReflectError::Connection(format!(
                "connection refused: {}:{}",
                config.host, config.port
            )));
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.events.lock().push(MockEvent::Opened {
            id,
            database: config.database.clone(),
        });
        Ok(Arc::new(MockConnection {
            id,
            database: config.database.clone(),
            closed: AtomicBool::new(false),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockConnection {
    id: usize,
    database: String,
    closed: AtomicBool,
    shared: Arc<Shared>,
}

#[async_trait]
impl CatalogConnection for MockConnection {
    async fn ping(&self) -> Result<()> {
        if take_failure(&self.shared.failing_pings) {
            return Err(ReflectError::Connection("ping timed out".into()));
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        if self.is_closed() {
            return Err(ReflectError::Query("connection is closed".into()));
        }
        let query = MockQuery {
            database: self.database.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        self.shared.queries.lock().push(query.clone());
        (self.shared.responder)(&query)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.events.lock().push(MockEvent::Closed {
                id: self.id,
                database: self.database.clone(),
            });
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Single text column rows
pub fn text_rows(column: &str, values: &[&str]) -> Vec<Row> {
    values
        .iter()
        .map(|v| Row::new(vec![column.to_string()], vec![Value::from(*v)]))
        .collect()
}

/// `(column_name, data_type)` rows
pub fn column_rows(columns: &[(&str, &str)]) -> Vec<Row> {
    columns
        .iter()
        .map(|(name, data_type)| {
            Row::new(
                vec!["column_name".to_string(), "data_type".to_string()],
                vec![Value::from(*name), Value::from(*data_type)],
            )
        })
        .collect()
}
