//! Connection data model: addresses, chain identifiers and session snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::SessionError;

// --- Address ---

/// A 20-byte account address as reported by a wallet backend.
///
/// Displayed and serialized in EIP-55 mixed-case checksum form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, used while no wallet is connected.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Render the address with its EIP-55 checksum applied.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Shortened form for log lines, e.g. `0x5aAe…eAed`.
    pub fn short(&self) -> String {
        let full = self.to_checksum();
        format!("{}…{}", &full[..6], &full[38..])
    }
}

impl FromStr for Address {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| SessionError::InvalidAddress(format!("missing 0x prefix: {s}")))?;

        if hex_part.len() != 40 {
            return Err(SessionError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                hex_part.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|e| SessionError::InvalidAddress(format!("{s}: {e}")))?;
        let address = Address(bytes);

        // Mixed case means the sender applied a checksum, so it has to match.
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(SessionError::InvalidAddress(format!("bad checksum: {s}")));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// --- Chain ---

/// Numeric identifier of the network a wallet is operating against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);

    pub fn value(self) -> u64 {
        self.0
    }

    /// Parse the `0x`-prefixed hex form used by EIP-1193 providers, or a
    /// plain decimal string.
    pub fn parse_quantity(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim().trim_matches('"');
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed
            .map(ChainId)
            .map_err(|e| SessionError::HandshakeFailed(format!("invalid chain id {raw:?}: {e}")))
    }
}

impl Default for ChainId {
    fn default() -> Self {
        ChainId::MAINNET
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        ChainId(value)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Session ---

/// Immutable snapshot of "who is connected, on which network".
///
/// Always replaced wholesale; there is no way to change one field of a live
/// snapshot in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub address: Address,
    pub chain_id: ChainId,
    pub connected: bool,
}

impl SessionState {
    /// The disconnected default for a given configured network.
    pub fn disconnected(chain_id: ChainId) -> Self {
        Self {
            address: Address::ZERO,
            chain_id,
            connected: false,
        }
    }

    pub fn connected(address: Address, chain_id: ChainId) -> Self {
        Self {
            address,
            chain_id,
            connected: true,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::disconnected(ChainId::MAINNET)
    }
}

/// Persisted identifier of the last successfully used wallet backend.
///
/// Stored as a bare JSON string so the value stays opaque to anything else
/// reading the same storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendDescriptor(String);

impl BackendDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_eip55_vectors() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in cases {
            let lower = expected.to_lowercase();
            let address: Address = lower.parse().unwrap();
            assert_eq!(address.to_checksum(), expected);
        }
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        let err = "0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse::<Address>()
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAddress(_)));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>().is_err());
    }

    #[test]
    fn zero_address_is_default() {
        let state = SessionState::default();
        assert!(state.address.is_zero());
        assert_eq!(state.chain_id, ChainId::MAINNET);
        assert!(!state.connected);
        assert_eq!(
            state.address.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn chain_id_parses_hex_and_decimal() {
        assert_eq!(ChainId::parse_quantity("0x89").unwrap(), ChainId(137));
        assert_eq!(ChainId::parse_quantity("\"0x1\"").unwrap(), ChainId(1));
        assert_eq!(ChainId::parse_quantity("1337").unwrap(), ChainId(1337));
        assert!(ChainId::parse_quantity("0xnope").is_err());
    }

    #[test]
    fn session_state_serializes_camel_case() {
        let address: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        let json = serde_json::to_value(SessionState::connected(address, ChainId(137))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                "chainId": 137,
                "connected": true,
            })
        );
    }

    #[test]
    fn descriptor_is_stored_as_bare_string() {
        let descriptor = BackendDescriptor::new("injected");
        assert_eq!(serde_json::to_string(&descriptor).unwrap(), "\"injected\"");
        let back: BackendDescriptor = serde_json::from_str("\"walletconnect\"").unwrap();
        assert_eq!(back.id(), "walletconnect");
    }
}
