use std::sync::Arc;

use relay_events::EventBus;
use relay_store::ListStore;

use crate::config::ServerConfig;
use crate::notifications::NotificationLifecycle;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Durable store holding both notification sequences.
    pub store: Arc<dyn ListStore>,
    /// Event bus every streaming connection subscribes to.
    pub bus: Arc<dyn EventBus>,
    /// Write path: create, verify and list.
    pub lifecycle: Arc<NotificationLifecycle>,
    /// Registry of live streaming connections.
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Wire the lifecycle manager and connection registry over the given
    /// backends.
    pub fn new(config: ServerConfig, store: Arc<dyn ListStore>, bus: Arc<dyn EventBus>) -> Self {
        let lifecycle = NotificationLifecycle::new(Arc::clone(&store), Arc::clone(&bus));
        Self {
            config: Arc::new(config),
            store,
            bus,
            lifecycle: Arc::new(lifecycle),
            ws_manager: Arc::new(WsManager::new()),
        }
    }
}
