//! Cross-platform persistent storage.
//!
//! The session client persists exactly one thing: the identifier of the last
//! wallet backend that connected successfully. Storage backends:
//! - Web: `localStorage`
//! - Desktop: one JSON file per key in the platform config directory:
//!   - Linux: `~/.config/chainsession/`
//!   - macOS: `~/Library/Application Support/chainsession/`
//!   - Windows: `%APPDATA%\chainsession\`
//! - [`MemoryStorage`] for in-process use.

use std::cell::RefCell;
use std::collections::HashMap;

use chainsession_shared::SessionError;
use serde::{de::DeserializeOwned, Serialize};

/// Raw string key/value persistence.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str);
}

/// Serialize `value` as JSON and store it under `key`.
pub fn save<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), SessionError> {
    let json = serde_json::to_string(value).map_err(|e| SessionError::Storage(e.to_string()))?;
    storage.set(key, &json)
}

/// Load a JSON value from `key`.
///
/// Returns `None` if the key doesn't exist or deserialization fails.
pub fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let json = storage.get(key)?;
    serde_json::from_str(&json).ok()
}

/// Check if a key exists in storage.
pub fn exists(storage: &dyn Storage, key: &str) -> bool {
    storage.get(key).is_some()
}

/// In-memory storage. Contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Browser-local persistent storage (or its desktop equivalent).
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    #[cfg(not(target_arch = "wasm32"))]
    dir: Option<std::path::PathBuf>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

// =========================================
// Web (WASM) implementation
// =========================================

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(target_arch = "wasm32")]
impl Storage for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        local_storage()?.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let storage = local_storage()
            .ok_or_else(|| SessionError::Storage("localStorage unavailable".to_string()))?;
        storage
            .set_item(key, value)
            .map_err(|e| SessionError::Storage(format!("{e:?}")))
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = local_storage() {
            let _ = storage.remove_item(key);
        }
    }
}

// =========================================
// Desktop (native) implementation
// =========================================

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorage {
    /// Store files under `dir` instead of the platform config directory.
    pub fn in_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn root(&self) -> Option<std::path::PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()?.join("chainsession"),
        };

        if !dir.exists() {
            std::fs::create_dir_all(&dir).ok()?;
        }

        Some(dir)
    }

    fn file_path(&self, key: &str) -> Option<std::path::PathBuf> {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(self.root()?.join(format!("{}.json", safe_key)))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Storage for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)?).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let path = self
            .file_path(key)
            .ok_or_else(|| SessionError::Storage("no config directory available".to_string()))?;
        std::fs::write(&path, value)
            .map_err(|e| SessionError::Storage(format!("{}: {e}", path.display())))
    }

    fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }
}
