use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{MemoryStore, RecordStore};

/// Shared router state: configuration plus the record store every
/// service reads and writes through.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self { config, store }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }
}
