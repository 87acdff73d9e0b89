//! Cached backend descriptor persistence.

use std::rc::Rc;

use chainsession_shared::{BackendDescriptor, SessionError};

use crate::storage::{self, Storage};

/// Reads and writes the cached backend descriptor under a single key.
#[derive(Clone)]
pub struct BackendCache {
    storage: Rc<dyn Storage>,
    key: String,
}

impl BackendCache {
    pub fn new(storage: Rc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cached descriptor, if present and readable.
    pub fn load(&self) -> Option<BackendDescriptor> {
        storage::load(self.storage.as_ref(), &self.key)
    }

    pub fn save(&self, descriptor: &BackendDescriptor) -> Result<(), SessionError> {
        storage::save(self.storage.as_ref(), &self.key, descriptor)
    }

    pub fn exists(&self) -> bool {
        storage::exists(self.storage.as_ref(), &self.key)
    }

    pub fn clear(&self) {
        self.storage.remove(&self.key);
    }
}
