use std::sync::Arc;

use crate::{config::AppConfig, service::PdfStore};

#[derive(Clone)]
pub struct AppState {
    pub store: PdfStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: PdfStore, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
