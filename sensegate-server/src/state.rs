//! Shared server state

use std::sync::Arc;

use sensegate_core::auth::{BasicAuth, HmacAuth};
use sensegate_core::snapshot::DeviceLabelMap;
use sensegate_core::{Config, StateStore};

/// Shared application state, injected into every handler
pub struct AppState {
    /// Latest reading per device
    pub store: StateStore,

    /// Basic-auth verifier for the snapshot read path
    pub read_auth: BasicAuth,

    /// HMAC verifier for batch pushes; present only in batch deployments
    pub batch_auth: Option<HmacAuth>,

    /// Display labels for snapshot keys
    pub labels: DeviceLabelMap,

    /// Order snapshot entries newest-first
    pub sort_by_recency: bool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build runtime state from a validated config
    pub fn from_config(config: &Config) -> Self {
        let batch_auth = if config.server.batch_ingest {
            config.server.hmac_secret.clone().map(HmacAuth::new)
        } else {
            None
        };

        Self {
            store: StateStore::new(),
            read_auth: BasicAuth::new(
                config.server.auth_user.clone(),
                config.server.auth_password.clone(),
            ),
            batch_auth,
            labels: config.label_map(),
            sort_by_recency: config.snapshot.sort_by_recency,
        }
    }
}
