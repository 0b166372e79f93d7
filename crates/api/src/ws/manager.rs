use std::collections::HashMap;
use std::time::Duration;

use relay_core::types::Timestamp;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Metadata for a single streaming connection.
pub struct WsConnection {
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Cancelling this token tears the connection's bridge down.
    pub cancel: CancellationToken,
}

/// Registry of all active streaming connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Every connection token is a child of the
/// manager's root token, so [`WsManager::shutdown_all`] reaches connections
/// that are still mid-registration.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    root: CancellationToken,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Register a connection and return the token that stops it.
    ///
    /// Re-registering an id cancels the connection it replaces.
    pub async fn add(&self, conn_id: String) -> CancellationToken {
        let cancel = self.root.child_token();
        let conn = WsConnection {
            connected_at: chrono::Utc::now(),
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.connections.write().await.insert(conn_id, conn) {
            previous.cancel.cancel();
        }
        cancel
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// When the connection `conn_id` was registered, if it is still active.
    pub async fn connected_at(&self, conn_id: &str) -> Option<Timestamp> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .map(|conn| conn.connected_at)
    }

    /// Whether [`WsManager::shutdown_all`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every connection.
    ///
    /// Used during graceful shutdown. Each bridge sends its own Close frame
    /// and removes itself from the registry as it winds down.
    pub async fn shutdown_all(&self) {
        self.root.cancel();
        let count = self.connection_count().await;
        tracing::info!(count, "Closing all WebSocket connections");
    }

    /// Wait until every connection has deregistered, or `timeout` elapses.
    ///
    /// Returns the number of connections still registered.
    pub async fn wait_closed(&self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = self.connection_count().await;
            if remaining == 0 || tokio::time::Instant::now() >= deadline {
                return remaining;
            }
            tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
