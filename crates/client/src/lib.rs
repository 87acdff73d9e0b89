//! Chainsession client - wallet session lifecycle for Dioxus apps
//!
//! Connects a wallet backend, keeps `{ address, chainId, connected }` in
//! step with it, silently restores the last used backend on startup and
//! answers any out-of-band wallet change with a full reload.

pub mod logging;

pub mod bridge;
pub mod config;
pub mod manager;
pub mod provider;
pub mod reload;
pub mod storage;
pub mod store;
pub mod wallet_session;

#[cfg(test)]
mod testing;

pub use chainsession_shared as shared;
pub use config::SessionConfig;
pub use manager::{SessionManager, SessionPhase};
pub use provider::{
    BackendCache, BackendSelector, ConnectionHandle, ModalProviderSource, PreferredSelector,
    ProviderSource, WalletBackend,
};
#[cfg(target_arch = "wasm32")]
pub use reload::PageReload;
pub use reload::{ChannelReload, Reloader};
pub use storage::{LocalStorage, MemoryStorage, Storage};
pub use wallet_session::{use_wallet, SharedSessionManager, WalletContext, WalletProvider};
