//! Caching provider source over a set of registered wallet backends.

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use chainsession_shared::{BackendDescriptor, SessionError};

use super::{BackendCache, BackendInfo, BackendSelector, ConnectionHandle, ProviderSource, WalletBackend};

/// Provider source that offers every available backend through a selector
/// and caches the chosen one for silent restores.
pub struct ModalProviderSource {
    backends: Vec<Rc<dyn WalletBackend>>,
    selector: Box<dyn BackendSelector>,
    cache: BackendCache,
    selecting: Cell<bool>,
}

/// Clears the in-flight flag even if the selection future is dropped early.
struct SelectionGuard<'a>(&'a Cell<bool>);

impl Drop for SelectionGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ModalProviderSource {
    pub fn new(selector: impl BackendSelector + 'static, cache: BackendCache) -> Self {
        Self {
            backends: Vec::new(),
            selector: Box::new(selector),
            cache,
            selecting: Cell::new(false),
        }
    }

    /// Register a backend. Later registrations with the same id are ignored.
    pub fn with_backend(mut self, backend: impl WalletBackend + 'static) -> Self {
        let id = backend.info().id;
        if self.backend(&id).is_some() {
            crate::log_warn!("backend '{}' registered twice, keeping the first", id);
        } else {
            self.backends.push(Rc::new(backend));
        }
        self
    }

    /// Info for every backend usable in this environment, in registration order.
    pub fn available(&self) -> Vec<BackendInfo> {
        self.backends
            .iter()
            .filter(|b| b.is_available())
            .map(|b| b.info())
            .collect()
    }

    /// The descriptor currently cached, if any.
    pub fn cached_backend(&self) -> Option<BackendDescriptor> {
        self.cache.load()
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting.get()
    }

    fn backend(&self, id: &str) -> Option<Rc<dyn WalletBackend>> {
        self.backends.iter().find(|b| b.info().id == id).cloned()
    }
}

#[async_trait(?Send)]
impl ProviderSource for ModalProviderSource {
    async fn select(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        if self.selecting.replace(true) {
            return Err(SessionError::SelectionInProgress);
        }
        let _guard = SelectionGuard(&self.selecting);

        let options = self.available();
        if options.is_empty() {
            return Err(SessionError::NoBackendAvailable);
        }

        let chosen = self.selector.choose(&options).await?;
        let backend = self
            .backend(&chosen)
            .filter(|b| b.is_available())
            .ok_or(SessionError::NoBackendAvailable)?;

        crate::log_debug!("connecting to wallet backend '{}'", chosen);
        backend.connect().await
    }

    fn has_cached_backend(&self) -> bool {
        self.cache.exists()
    }

    async fn restore_cached(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        let descriptor = self
            .cache
            .load()
            .ok_or_else(|| SessionError::RestoreFailed("no readable cached backend".to_string()))?;

        let backend = self
            .backend(descriptor.id())
            .ok_or_else(|| SessionError::RestoreFailed(format!("unknown backend '{}'", descriptor)))?;
        if !backend.is_available() {
            return Err(SessionError::RestoreFailed(format!(
                "backend '{}' is not available",
                descriptor
            )));
        }

        crate::log_debug!("silently reconnecting wallet backend '{}'", descriptor);
        backend.reconnect().await.map_err(|err| match err {
            SessionError::InvariantViolation(_) | SessionError::RestoreFailed(_) => err,
            other => SessionError::RestoreFailed(other.to_string()),
        })
    }

    fn remember(&self, descriptor: &BackendDescriptor) -> Result<(), SessionError> {
        self.cache.save(descriptor)
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Selector without a UI: picks the first available backend in preference
/// order, falling back to registration order.
#[derive(Debug, Clone, Default)]
pub struct PreferredSelector {
    preferred: Vec<String>,
}

impl PreferredSelector {
    pub fn new(preferred: Vec<String>) -> Self {
        Self { preferred }
    }
}

#[async_trait(?Send)]
impl BackendSelector for PreferredSelector {
    async fn choose(&self, options: &[BackendInfo]) -> Result<String, SessionError> {
        self.preferred
            .iter()
            .find(|id| options.iter().any(|o| &o.id == *id))
            .cloned()
            .or_else(|| options.first().map(|o| o.id.clone()))
            .ok_or(SessionError::UserCancelled)
    }
}
