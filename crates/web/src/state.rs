//! Application state shared across handlers.

use std::sync::Arc;

use crate::storage::StorageFacade;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands every request the
/// same provisioned storage facade.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    storage: StorageFacade,
    max_upload_bytes: usize,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `storage` - Facade returned by `StorageFacade::initialize`
    /// * `max_upload_bytes` - Request body limit for upload routes
    #[must_use]
    pub fn new(storage: StorageFacade, max_upload_bytes: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                storage,
                max_upload_bytes,
            }),
        }
    }

    /// Get a reference to the storage facade.
    #[must_use]
    pub fn storage(&self) -> &StorageFacade {
        &self.inner.storage
    }

    /// Largest accepted request body, in bytes.
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }
}
