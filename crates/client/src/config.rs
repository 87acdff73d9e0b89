//! Session client configuration.

use chainsession_shared::{network_by_name, ChainId};

/// Storage key holding the cached backend descriptor.
pub const DEFAULT_STORAGE_KEY: &str = "WEB3_CONNECT_CACHED_PROVIDER";

/// Network assumed before any wallet reports one.
pub const DEFAULT_NETWORK: &str = "mainnet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name of the configured default network.
    pub network: String,
    /// Silently restore the cached backend at startup.
    pub auto_load: bool,
    /// Remember the backend of a successful connect for later restores.
    pub cache_provider: bool,
    /// Key of the persisted backend descriptor.
    pub storage_key: String,
    /// Backend ids in the order the selector should prefer them.
    pub preferred_backends: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            auto_load: true,
            cache_provider: true,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            preferred_backends: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Build a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHAINSESSION_NETWORK`: default network name (default: "mainnet")
    /// - `CHAINSESSION_AUTO_LOAD`: "true" | "false" (default: "true")
    /// - `CHAINSESSION_CACHE_PROVIDER`: "true" | "false" (default: "true")
    /// - `CHAINSESSION_STORAGE_KEY`: descriptor key (default: "WEB3_CONNECT_CACHED_PROVIDER")
    /// - `CHAINSESSION_BACKENDS`: comma-separated backend preference (default: empty)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| match lookup(name) {
            Some(raw) => !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
            None => default,
        };

        Self {
            network: lookup("CHAINSESSION_NETWORK").unwrap_or(defaults.network),
            auto_load: flag("CHAINSESSION_AUTO_LOAD", defaults.auto_load),
            cache_provider: flag("CHAINSESSION_CACHE_PROVIDER", defaults.cache_provider),
            storage_key: lookup("CHAINSESSION_STORAGE_KEY").unwrap_or(defaults.storage_key),
            preferred_backends: lookup("CHAINSESSION_BACKENDS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Chain of the disconnected default session. Unknown network names fall
    /// back to mainnet.
    pub fn default_chain_id(&self) -> ChainId {
        network_by_name(&self.network)
            .map(|n| n.chain_id)
            .unwrap_or(ChainId::MAINNET)
    }
}
