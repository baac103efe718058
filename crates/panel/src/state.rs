//! Application state shared across panel route handlers.

use std::sync::Arc;

use crate::config::PanelConfig;
use crate::firebase::{FirebaseAuthClient, FirestoreClient};
use crate::services::guard::SessionGuard;

/// The guard as wired for production: Firebase Authentication as the
/// identity provider, Firestore as the registry store.
pub type PanelGuard = SessionGuard<FirebaseAuthClient, FirestoreClient>;

/// Shared application state. Cheap to clone; all data lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PanelConfig,
    guard: Arc<PanelGuard>,
}

impl AppState {
    /// Create state from loaded configuration and a constructed guard.
    #[must_use]
    pub fn new(config: PanelConfig, guard: Arc<PanelGuard>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, guard }),
        }
    }

    /// The panel configuration.
    #[must_use]
    pub fn config(&self) -> &PanelConfig {
        &self.inner.config
    }

    /// The session guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<PanelGuard> {
        &self.inner.guard
    }
}
