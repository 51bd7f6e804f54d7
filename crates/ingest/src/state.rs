use std::sync::Arc;
use std::time::Duration;

use telesink_core::config::Config;
use telesink_store::Store;

/// Per-process settings the handlers read.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub machine_id: String,
    pub history_limit: usize,
    pub stream_keepalive: Duration,
}

impl HttpSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            machine_id: cfg.machine_id.clone(),
            history_limit: cfg.history_limit,
            stream_keepalive: cfg.stream_keepalive,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub settings: Arc<HttpSettings>,
}

impl AppState {
    pub fn new(store: Store, settings: HttpSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }
}
