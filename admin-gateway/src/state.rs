//! Shared application state.

use std::sync::Arc;

use common::config::AppConfig;

use crate::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.clone()));
        Self { config, registry }
    }
}
