use std::sync::Arc;

use crate::batch::BatchJobRegistry;
use crate::config::AppConfig;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jobs: BatchJobRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            jobs: BatchJobRegistry::new(),
        }
    }
}
