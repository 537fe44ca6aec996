//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the backend collaborators, the typed config, and the process-wide
//! per-user registries: settings stores and in-flight submit slots. The
//! authorization policy is a trait object so deployments can swap it.

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::AppConfig;
use crate::console::inflight::InFlight;
use crate::console::policy::{Authorizer, RolePolicy};
use crate::console::settings::SettingsRegistry;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub config: Arc<AppConfig>,
    pub settings: SettingsRegistry,
    pub inflight: InFlight,
    pub policy: Arc<dyn Authorizer>,
}

impl AppState {
    #[must_use]
    pub fn new(backend: Backend, config: AppConfig) -> Self {
        let settings = SettingsRegistry::new(backend.records.clone(), backend.storage.clone());
        Self {
            backend,
            config: Arc::new(config),
            settings,
            inflight: InFlight::new(),
            policy: Arc::new(RolePolicy),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
