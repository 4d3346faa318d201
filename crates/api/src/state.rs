use std::sync::Arc;

use rigforge_db::AssetStore;
use rigforge_events::EventBus;
use rigforge_pipeline::RiggingLifecycle;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Asset metadata store (memory or PostgreSQL).
    pub store: Arc<dyn AssetStore>,
    /// Rigging lifecycle manager; the only writer of rigging status.
    pub lifecycle: Arc<RiggingLifecycle>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Event bus the lifecycle publishes committed changes on.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire a lifecycle manager over `store` using the configured tunables.
    pub fn new(store: Arc<dyn AssetStore>, event_bus: Arc<EventBus>, config: ServerConfig) -> Self {
        let lifecycle = Arc::new(RiggingLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&event_bus),
            config.lifecycle_config(),
        ));
        Self {
            store,
            lifecycle,
            config: Arc::new(config),
            event_bus,
        }
    }
}
