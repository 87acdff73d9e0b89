//! Wallet provider layer.
//!
//! This module provides:
//! - [`ConnectionHandle`]: one live link to a wallet backend
//! - [`WalletBackend`]: something that can produce handles (injected
//!   extension, remote signer, ...)
//! - [`ProviderSource`]: the selection/restore contract the session manager
//!   drives, and [`ModalProviderSource`], its caching implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ModalProviderSource                 │
//! │   (selection flow + cached backend descriptor)      │
//! └─────────────────────────────────────────────────────┘
//!          │                   │                  │
//!          ▼                   ▼                  ▼
//!   ┌─────────────┐   ┌─────────────────┐  ┌─────────────┐
//!   │BackendSelect│   │ WalletBackend(s)│  │BackendCache │
//!   │ (user pick) │   │ injected, ...   │  │ (Storage)   │
//!   └─────────────┘   └─────────────────┘  └─────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │  ConnectionHandle   │
//!                   │ address/chain/events│
//!                   └─────────────────────┘
//! ```

mod cache;
#[cfg(target_arch = "wasm32")]
mod injected;
mod modal;

use std::rc::Rc;

use async_trait::async_trait;
use chainsession_shared::{
    Address, BackendDescriptor, ChainId, ProviderEvent, ProviderEventKind, SessionError,
};

pub use cache::BackendCache;
#[cfg(target_arch = "wasm32")]
pub use injected::{InjectedBackend, InjectedHandle, INJECTED_BACKEND_ID};
pub use modal::{ModalProviderSource, PreferredSelector};

/// Callback registered on a handle for one event name.
pub type EventListener = Rc<dyn Fn(ProviderEvent)>;

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A live connection to a wallet backend.
#[async_trait(?Send)]
pub trait ConnectionHandle {
    /// Which backend produced this handle.
    fn descriptor(&self) -> BackendDescriptor;

    /// Currently selected account.
    async fn get_address(&self) -> Result<Address, SessionError>;

    /// Network the wallet is currently on.
    async fn get_chain_id(&self) -> Result<ChainId, SessionError>;

    /// Subscribe `listener` to `kind`.
    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId;

    /// Remove a listener previously returned by [`ConnectionHandle::on`].
    fn off(&self, kind: ProviderEventKind, id: ListenerId);

    /// Tear the connection down.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Display metadata for a backend offered in the selection flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub id: String,
    pub name: String,
}

/// A kind of wallet the user can pick.
#[async_trait(?Send)]
pub trait WalletBackend {
    fn info(&self) -> BackendInfo;

    /// Whether the backend can be used in this environment at all.
    fn is_available(&self) -> bool;

    /// Interactive connect; may prompt the user.
    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError>;

    /// Silent reconnect without prompting.
    async fn reconnect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        self.connect().await
    }
}

/// The wallet-selection flow: picks one of the offered backends.
#[async_trait(?Send)]
pub trait BackendSelector {
    /// Resolve to the chosen backend id, or [`SessionError::UserCancelled`].
    async fn choose(&self, options: &[BackendInfo]) -> Result<String, SessionError>;
}

/// Source of connection handles for the session manager.
#[async_trait(?Send)]
pub trait ProviderSource {
    /// Run the selection flow and hand back a connected handle.
    async fn select(&self) -> Result<Box<dyn ConnectionHandle>, SessionError>;

    fn has_cached_backend(&self) -> bool;

    /// Reconnect the cached backend without prompting the user.
    async fn restore_cached(&self) -> Result<Box<dyn ConnectionHandle>, SessionError>;

    /// Persist `descriptor` as the backend to restore next time.
    fn remember(&self, descriptor: &BackendDescriptor) -> Result<(), SessionError>;

    /// Forget the cached backend. Idempotent.
    fn clear_cache(&self);
}
