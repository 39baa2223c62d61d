use std::sync::Arc;

use crate::auth::{JwtCodec, TokenCodec};
use crate::config::AppConfig;
use crate::db::Store;
use crate::services::{CodeSender, LogCodeSender, ServiceContainer};
use crate::storage::{FileStorage, LocalFileStorage};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: Arc<dyn TokenCodec>,
    pub services: ServiceContainer,
}

impl AppState {
    /// Wire the default collaborators (JWT tokens, local media, logged codes)
    /// around a store.
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let tokens: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(&config.auth));
        let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::from_config(&config.media));
        Self::with_parts(config, store, tokens, files, Arc::new(LogCodeSender))
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn Store>,
        tokens: Arc<dyn TokenCodec>,
        files: Arc<dyn FileStorage>,
        codes: Arc<dyn CodeSender>,
    ) -> Self {
        let services = ServiceContainer::new(&config, store.clone(), tokens.clone(), files, codes);
        Self {
            config: Arc::new(config),
            store,
            tokens,
            services,
        }
    }
}
