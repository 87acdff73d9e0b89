//! Provider event vocabulary.
//!
//! A connection handle reports out-of-band wallet changes through three event
//! names. These types are what a handle's listeners receive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Address, ChainId};

/// The three event names a connection handle can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderEventKind {
    ChainChanged,
    AccountsChanged,
    Disconnect,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 3] = [
        ProviderEventKind::ChainChanged,
        ProviderEventKind::AccountsChanged,
        ProviderEventKind::Disconnect,
    ];

    /// Wire name used by EIP-1193 providers.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderEventKind::ChainChanged => "chainChanged",
            ProviderEventKind::AccountsChanged => "accountsChanged",
            ProviderEventKind::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An out-of-band change reported by a wallet backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProviderEvent {
    /// The wallet switched networks. `old` is `None` on the initial
    /// notification some providers emit right after subscription.
    #[serde(rename_all = "camelCase")]
    ChainChanged { new: ChainId, old: Option<ChainId> },
    /// The exposed account list changed (switch, lock, revoke).
    AccountsChanged { accounts: Vec<Address> },
    /// The backend terminated the connection.
    Disconnect { code: Option<i64>, message: Option<String> },
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::ChainChanged { .. } => ProviderEventKind::ChainChanged,
            ProviderEvent::AccountsChanged { .. } => ProviderEventKind::AccountsChanged,
            ProviderEvent::Disconnect { .. } => ProviderEventKind::Disconnect,
        }
    }
}

/// Why the application is being reloaded from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum ReloadReason {
    ChainChanged { from: ChainId, to: ChainId },
    AccountsChanged,
    BackendDisconnected,
    UserDisconnected,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadReason::ChainChanged { from, to } => {
                write!(f, "chain changed from {} to {}", from, to)
            }
            ReloadReason::AccountsChanged => f.write_str("accounts changed"),
            ReloadReason::BackendDisconnected => f.write_str("backend disconnected"),
            ReloadReason::UserDisconnected => f.write_str("user disconnected"),
        }
    }
}
