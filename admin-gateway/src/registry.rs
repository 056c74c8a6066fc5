//! Holder of the single active connection.
//!
//! Requests pin the connection they started with by cloning its
//! [`ActiveConnection`]. Replacing or dropping the connection only swaps the
//! slot; the old adapter is closed once the last in-flight request releases it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionConfig, DbType};

use crate::adapters::{Adapter, MongoAdapter, MySqlAdapter, PostgresAdapter};

/// How often a retired adapter checks whether it is still in use.
const RETIRE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A connected adapter and the configuration it was opened with.
#[derive(Clone)]
pub struct ActiveConnection {
    config: Arc<ConnectionConfig>,
    adapter: Arc<dyn Adapter>,
}

impl ActiveConnection {
    pub fn new(config: ConnectionConfig, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    pub fn engine(&self) -> DbType {
        self.adapter.engine()
    }
}

/// Opens an adapter for the configured engine.
pub async fn open_adapter(
    config: &ConnectionConfig,
    settings: &AppConfig,
) -> AppResult<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match config.db_type {
        DbType::MySQL => Arc::new(MySqlAdapter::connect(config, settings).await?),
        DbType::Postgres => Arc::new(PostgresAdapter::connect(config, settings).await?),
        DbType::MongoDB => Arc::new(MongoAdapter::connect(config, settings).await?),
    };
    Ok(adapter)
}

pub struct ConnectionRegistry {
    active: RwLock<Option<ActiveConnection>>,
    settings: AppConfig,
}

impl ConnectionRegistry {
    pub fn new(settings: AppConfig) -> Self {
        Self {
            active: RwLock::new(None),
            settings,
        }
    }

    /// Opens a connection, lists its tables and makes it the active one.
    ///
    /// On failure the previous connection stays active.
    pub async fn connect(&self, config: ConnectionConfig) -> AppResult<Vec<String>> {
        info!(engine = %config.db_type, url = %config.masked_url(), "Opening connection");

        let adapter = open_adapter(&config, &self.settings).await?;
        let tables = match adapter.list_targets().await {
            Ok(tables) => tables,
            Err(e) => {
                adapter.close().await;
                return Err(e);
            }
        };

        info!(engine = %config.db_type, tables = tables.len(), "Connection established");
        self.install(ActiveConnection::new(config, adapter)).await;
        Ok(tables)
    }

    /// Makes `connection` the active one and retires the previous one.
    pub async fn install(&self, connection: ActiveConnection) {
        let previous = self.active.write().await.replace(connection);
        if let Some(previous) = previous {
            retire(previous);
        }
    }

    pub async fn current(&self) -> Option<ActiveConnection> {
        self.active.read().await.clone()
    }

    /// Clears the slot.
    ///
    /// # Errors
    /// Returns `AppError::NoActiveConnection` if nothing was connected.
    pub async fn disconnect(&self) -> AppResult<()> {
        let previous = self
            .active
            .write()
            .await
            .take()
            .ok_or(AppError::NoActiveConnection)?;
        retire(previous);
        Ok(())
    }

    /// Closes the active connection in place, for process shutdown.
    pub async fn close(&self) {
        let active = self.active.write().await.take();
        if let Some(connection) = active {
            connection.adapter.close().await;
            info!(engine = %connection.config.db_type, "Active connection closed");
        }
    }
}

/// Closes the adapter once no request holds it any more.
fn retire(connection: ActiveConnection) {
    let ActiveConnection { config, adapter } = connection;
    tokio::spawn(async move {
        while Arc::strong_count(&adapter) > 1 {
            tokio::time::sleep(RETIRE_POLL_INTERVAL).await;
        }
        adapter.close().await;
        info!(engine = %config.db_type, host = %config.host, "Previous connection closed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Operation;
    use async_trait::async_trait;
    use common::models::RowSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Probe {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Adapter for Probe {
        fn engine(&self) -> DbType {
            DbType::Postgres
        }

        async fn execute(&self, _op: &Operation) -> AppResult<RowSet> {
            Ok(Vec::new())
        }

        async fn list_targets(&self) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn probe() -> (ActiveConnection, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let config = ConnectionConfig {
            host: "db".into(),
            port: 5432,
            username: String::new(),
            password: String::new(),
            database: "app".into(),
            db_type: DbType::Postgres,
        };
        let adapter = Arc::new(Probe {
            closed: closed.clone(),
        });
        (ActiveConnection::new(config, adapter), closed)
    }

    async fn wait_until(flag: &AtomicBool) -> bool {
        for _ in 0..40 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_empty_registry_has_no_connection() {
        let registry = ConnectionRegistry::new(AppConfig::default());
        assert!(registry.current().await.is_none());
        assert!(matches!(
            registry.disconnect().await,
            Err(AppError::NoActiveConnection)
        ));
    }

    #[tokio::test]
    async fn test_replaced_connection_closes_after_last_holder() {
        let registry = ConnectionRegistry::new(AppConfig::default());
        let (first, first_closed) = probe();
        registry.install(first).await;

        let in_flight = registry.current().await.unwrap();
        let (second, second_closed) = probe();
        registry.install(second).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!first_closed.load(Ordering::SeqCst));

        drop(in_flight);
        assert!(wait_until(&first_closed).await);
        assert!(!second_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_clears_and_closes() {
        let registry = ConnectionRegistry::new(AppConfig::default());
        let (conn, closed) = probe();
        registry.install(conn).await;

        registry.disconnect().await.unwrap();
        assert!(registry.current().await.is_none());
        assert!(wait_until(&closed).await);
    }
}
