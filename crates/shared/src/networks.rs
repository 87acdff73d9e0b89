//! Known EVM networks, used to resolve a configured network name into the
//! default chain of a disconnected session.

use serde::Serialize;

use crate::models::ChainId;

/// A network the client knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Network {
    pub chain_id: ChainId,
    pub name: &'static str,
    pub is_testnet: bool,
}

pub const MAINNET: Network = Network {
    chain_id: ChainId(1),
    name: "mainnet",
    is_testnet: false,
};

pub const GOERLI: Network = Network {
    chain_id: ChainId(5),
    name: "goerli",
    is_testnet: true,
};

pub const SEPOLIA: Network = Network {
    chain_id: ChainId(11_155_111),
    name: "sepolia",
    is_testnet: true,
};

pub const POLYGON: Network = Network {
    chain_id: ChainId(137),
    name: "polygon",
    is_testnet: false,
};

/// Local development chain.
pub const LOCALHOST: Network = Network {
    chain_id: ChainId(1337),
    name: "localhost",
    is_testnet: true,
};

pub const KNOWN_NETWORKS: &[Network] = &[MAINNET, GOERLI, SEPOLIA, POLYGON, LOCALHOST];

/// Look up a network by name (case-insensitive). `"homestead"` is accepted
/// as an alias for mainnet.
pub fn network_by_name(name: &str) -> Option<Network> {
    let name = name.trim().to_ascii_lowercase();
    if name == "homestead" {
        return Some(MAINNET);
    }
    KNOWN_NETWORKS.iter().copied().find(|n| n.name == name)
}

pub fn network_by_chain_id(chain_id: ChainId) -> Option<Network> {
    KNOWN_NETWORKS.iter().copied().find(|n| n.chain_id == chain_id)
}

/// Human-readable label for log lines, e.g. `polygon (137)` or `chain 42`.
pub fn describe_chain(chain_id: ChainId) -> String {
    match network_by_chain_id(chain_id) {
        Some(network) => format!("{} ({})", network.name, chain_id),
        None => format!("chain {}", chain_id),
    }
}
