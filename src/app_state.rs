use crate::store::DocumentStore;
use std::sync::Arc;

/// Shared per-worker state. The store is injected so tests can swap in
/// the in-memory backend.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
