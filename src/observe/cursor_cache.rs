// src/observe/cursor_cache.rs

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

/// Path → change-stream cursor, shared by every cursor task of one provider.
///
/// Clones share the same map. Entries for different paths are written from
/// different workers concurrently; a single path only ever has one live task
/// writing its entry, because the registry keeps one task per path.
#[derive(Debug, Clone, Default)]
pub struct CursorCache {
    cursors: Arc<RwLock<HashMap<String, String>>>,
}

impl CursorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.cursors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Replace the cursor for `path` with a freshly fetched one.
    pub fn store(&self, path: &str, cursor: &str) {
        debug!(path = %path, "storing cursor");
        self.cursors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), cursor.to_string());
    }

    pub fn len(&self) -> usize {
        self.cursors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
