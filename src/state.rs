// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config, services::notifier::Notifier, store::PortalStore, utils::storage::ObjectStorage,
};

/// Collaborators shared by every request. Built once in `main` (or by a test)
/// and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PortalStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Notifier,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
