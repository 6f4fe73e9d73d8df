//! Connection lifecycle: open, verify, retry with fixed backoff, release

use crate::{CatalogConnection, ConnectionConfig, Connector, ReflectError, Result, RetryPolicy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lifecycle state of a driver's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, `connect` never called
    Unconnected,
    /// Inside the retry loop
    Connecting,
    /// A verified handle is stored
    Connected,
    /// The last `connect` exhausted its retries and no live handle remains
    Failed,
    /// `close` released the handle
    Closed,
}

/// Owns a driver's descriptor and its single live connection.
///
/// Embedded in every dialect driver. The handle slot and state sit behind
/// short, non-async locks; `connect` and `close` are additionally serialized
/// so concurrent callers never interleave a reconnect.
pub struct ConnectionManager {
    backend: &'static str,
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    policy: RetryPolicy,
    handle: Mutex<Option<Arc<dyn CatalogConnection>>>,
    state: Mutex<ConnectionState>,
    /// Failed attempts in the current (or last) `connect` call
    attempts: AtomicU32,
    transition: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    pub fn new(
        backend: &'static str,
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            connector,
            config,
            policy,
            handle: Mutex::new(None),
            state: Mutex::new(ConnectionState::Unconnected),
            attempts: AtomicU32::new(0),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Failed attempts counted by the most recent `connect` call
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn handle(&self) -> Option<Arc<dyn CatalogConnection>> {
        self.handle.lock().clone()
    }

    /// The live handle, or `NotConnected`
    pub fn require_handle(&self) -> Result<Arc<dyn CatalogConnection>> {
        self.handle
            .lock()
            .clone()
            .filter(|conn| !conn.is_closed())
            .ok_or(ReflectError::NotConnected)
    }

    /// Establish the driver's connection, replacing (and closing) any previous one.
    ///
    /// The attempt counter starts from zero on every call. A failed reconnect
    /// leaves a previously stored live handle in place, and the state stays
    /// `Connected` so it agrees with `require_handle`.
    #[tracing::instrument(skip(self), fields(backend = self.backend, host = %self.config.host, database = %self.config.database))]
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        *self.state.lock() = ConnectionState::Connecting;
        self.attempts.store(0, Ordering::SeqCst);

        match establish(
            self.backend,
            self.connector.as_ref(),
            &self.config,
            self.policy,
            &self.attempts,
        )
        .await
        {
            Ok(conn) => {
                let previous = self.handle.lock().replace(conn);
                *self.state.lock() = ConnectionState::Connected;
                if let Some(previous) = previous {
                    release(self.backend, previous).await;
                }
                tracing::info!("{} connection established", self.backend);
                Ok(())
            }
            Err(e) => {
                let live = self
                    .handle
                    .lock()
                    .as_ref()
                    .is_some_and(|conn| !conn.is_closed());
                *self.state.lock() = if live {
                    tracing::warn!(backend = self.backend, "reconnect failed, keeping previous connection");
                    ConnectionState::Connected
                } else {
                    ConnectionState::Failed
                };
                Err(e)
            }
        }
    }

    /// Open a connection that is independent of the stored handle.
    ///
    /// Uses the same retry policy with its own counter. The caller owns the
    /// returned connection and must close it.
    #[tracing::instrument(skip(self, config), fields(backend = self.backend, database = %config.database))]
    pub async fn open_scoped(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn CatalogConnection>> {
        let attempts = AtomicU32::new(0);
        establish(
            self.backend,
            self.connector.as_ref(),
            config,
            self.policy,
            &attempts,
        )
        .await
    }

    /// Release the stored handle
    pub async fn close(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        let previous = self.handle.lock().take();
        *self.state.lock() = ConnectionState::Closed;
        if let Some(conn) = previous {
            tracing::info!(backend = self.backend, "closing connection");
            conn.close().await?;
        }
        Ok(())
    }
}

async fn establish(
    backend: &'static str,
    connector: &dyn Connector,
    config: &ConnectionConfig,
    policy: RetryPolicy,
    attempts: &AtomicU32,
) -> Result<Arc<dyn CatalogConnection>> {
    loop {
        match open_and_ping(connector, config).await {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                let failures = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(backend, attempt = failures, error = %err, "{} not yet ready", backend);
                if failures > policy.max_retries {
                    tracing::error!(backend, attempts = failures, error = %err, "giving up on connection");
                    return Err(err.into_connection());
                }
                tracing::info!(backend, backoff_ms = policy.backoff_ms, "pausing before next connection attempt");
                tokio::time::sleep(policy.backoff()).await;
            }
        }
    }
}

async fn open_and_ping(
    connector: &dyn Connector,
    config: &ConnectionConfig,
) -> Result<Arc<dyn CatalogConnection>> {
    let conn = connector.open(config).await?;
    if let Err(err) = conn.ping().await {
        if let Err(close_err) = conn.close().await {
            tracing::debug!(error = %close_err, "failed to close connection after ping failure");
        }
        return Err(err);
    }
    Ok(conn)
}

async fn release(backend: &'static str, conn: Arc<dyn CatalogConnection>) {
    if let Err(e) = conn.close().await {
        tracing::warn!(backend, error = %e, "failed to close replaced connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockEvent};
    use std::time::Duration;
    use tokio::time::Instant;

    fn manager(connector: &MockConnector, policy: RetryPolicy) -> ConnectionManager {
        ConnectionManager::new(
            "postgres",
            Arc::new(connector.clone()),
            ConnectionConfig::postgres_default(),
            policy,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reachable_backend_first_try() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::default());
        assert_eq!(manager.state(), ConnectionState::Unconnected);
        assert!(manager.handle().is_none());

        let start = Instant::now();
        manager.connect().await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.attempts(), 0);
        assert_eq!(connector.open_attempts(), 1);
        assert!(manager.require_handle().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_recovers_before_cap() {
        let connector = MockConnector::empty().fail_opens(3);
        let manager = manager(&connector, RetryPolicy::default());

        let start = Instant::now();
        manager.connect().await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(manager.attempts(), 3);
        assert_eq!(connector.open_attempts(), 4);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_unreachable_gives_up_after_cap() {
        let connector = MockConnector::unreachable();
        let manager = manager(&connector, RetryPolicy::default());

        let start = Instant::now();
        let err = manager.connect().await.unwrap_err();

        assert!(err.is_connection());
        // ten pauses of two seconds between eleven attempts
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(connector.open_attempts(), 11);
        assert_eq!(manager.attempts(), 11);
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(matches!(
            manager.require_handle(),
            Err(ReflectError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_honors_custom_policy() {
        let connector = MockConnector::unreachable();
        let manager = manager(&connector, RetryPolicy::new(2, Duration::from_millis(500)));

        let start = Instant::now();
        assert!(manager.connect().await.is_err());

        assert_eq!(connector.open_attempts(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_counter_resets_per_connect() {
        let connector = MockConnector::empty().fail_opens(11);
        let manager = manager(&connector, RetryPolicy::default());

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.attempts(), 11);

        manager.connect().await.unwrap();
        assert_eq!(manager.attempts(), 0);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_are_per_driver() {
        let connector = MockConnector::empty().fail_opens(2);
        let first = manager(&connector, RetryPolicy::default());
        let second = manager(&connector, RetryPolicy::default());

        first.connect().await.unwrap();
        second.connect().await.unwrap();

        assert_eq!(first.attempts(), 2);
        assert_eq!(second.attempts(), 0);
    }

    #[tokio::test]
    async fn test_ping_failure_releases_opened_handle() {
        let connector = MockConnector::empty().fail_pings(1);
        let manager = manager(&connector, RetryPolicy::new(1, Duration::ZERO));

        manager.connect().await.unwrap();

        assert_eq!(
            connector.events(),
            vec![
                MockEvent::Opened { id: 0, database: "postgres".into() },
                MockEvent::Closed { id: 0, database: "postgres".into() },
                MockEvent::Opened { id: 1, database: "postgres".into() },
            ]
        );
        assert_eq!(connector.live_connections(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_handle() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::default());

        manager.connect().await.unwrap();
        let first = manager.handle().unwrap();
        manager.connect().await.unwrap();
        let second = manager.handle().unwrap();

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.live_connections(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_live_handle_consistent() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::new(0, Duration::ZERO));

        manager.connect().await.unwrap();
        let stored = manager.handle().unwrap();
        let _ = connector.clone().fail_opens(1);

        assert!(manager.connect().await.unwrap_err().is_connection());
        assert_eq!(manager.state(), ConnectionState::Connected);
        let live = manager.require_handle().unwrap();
        assert!(Arc::ptr_eq(&stored, &live));
        assert!(!live.is_closed());
    }

    #[tokio::test]
    async fn test_failed_connect_after_close_is_failed() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::new(0, Duration::ZERO));

        manager.connect().await.unwrap();
        manager.close().await.unwrap();
        let _ = connector.clone().fail_opens(1);

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(matches!(
            manager.require_handle(),
            Err(ReflectError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_releases_handle() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::default());

        manager.connect().await.unwrap();
        let handle = manager.handle().unwrap();
        manager.close().await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.handle().is_none());
        assert!(matches!(
            manager.require_handle(),
            Err(ReflectError::NotConnected)
        ));
        assert_eq!(connector.live_connections(), 0);

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_open_scoped_leaves_stored_handle_alone() {
        let connector = MockConnector::empty();
        let manager = manager(&connector, RetryPolicy::default());
        manager.connect().await.unwrap();
        let stored = manager.handle().unwrap();

        let scoped = manager
            .open_scoped(&manager.config().with_database("inventory"))
            .await
            .unwrap();
        scoped.close().await.unwrap();

        assert!(Arc::ptr_eq(&stored, &manager.handle().unwrap()));
        assert!(!stored.is_closed());
        assert_eq!(manager.config().database, "postgres");
        assert_eq!(
            connector.events().last(),
            Some(&MockEvent::Closed { id: 1, database: "inventory".into() })
        );
    }
}
