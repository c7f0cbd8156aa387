use depot_artifact::ArtifactStore;
use depot_core::{AccessGuard, DepotConfig};
use std::sync::Arc;
use std::time::Duration;

/// Request-handling settings fixed at startup
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub max_upload_bytes: u64,
    pub max_form_memory_bytes: u64,
    pub protect_uploads: bool,
    pub content_type: String,
    pub request_timeout: Duration,
}

impl ServerSettings {
    pub fn from_config(config: &DepotConfig) -> Self {
        Self {
            max_upload_bytes: config.limits.max_upload_bytes,
            max_form_memory_bytes: config.limits.max_form_memory_bytes,
            protect_uploads: config.auth.protect_uploads,
            content_type: config.download.content_type.clone(),
            request_timeout: config.server.request_timeout(),
        }
    }
}

/// Shared, immutable state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArtifactStore>,
    pub guard: AccessGuard,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArtifactStore>, guard: AccessGuard, settings: ServerSettings) -> Self {
        Self {
            store,
            guard,
            settings: Arc::new(settings),
        }
    }

    /// Build state from configuration; fails when no access key is configured.
    pub fn from_config(config: &DepotConfig, store: Arc<dyn ArtifactStore>) -> anyhow::Result<Self> {
        let guard = AccessGuard::new(config.access_key()?);
        Ok(Self::new(store, guard, ServerSettings::from_config(config)))
    }
}
