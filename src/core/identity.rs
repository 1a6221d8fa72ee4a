//! Principal and Asset Identifiers
//!
//! Fixed-size 16-byte identifiers for accounts and token contracts.
//! Both implement Ord for deterministic BTreeMap ordering.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain prefix for label-derived account ids.
const ACCOUNT_DOMAIN: &[u8] = b"habit-stake-account:";

/// Domain prefix for node-owned service accounts. Never reachable from a
/// JWT subject.
const SERVICE_DOMAIN: &[u8] = b"habit-stake-service:";

/// Domain prefix for label-derived token addresses.
const TOKEN_DOMAIN: &[u8] = b"habit-stake-token:";

fn derive_bytes(domain: &[u8], label: &str) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(label.as_bytes());
    let hash = hasher.finalize();

    let mut id = [0u8; 16];
    id.copy_from_slice(&hash[..16]);
    id
}

fn parse_bytes(s: &str) -> Option<[u8; 16]> {
    if let Ok(u) = uuid::Uuid::parse_str(s) {
        return Some(*u.as_bytes());
    }
    let bytes = hex::decode(s.trim_start_matches("0x")).ok()?;
    if bytes.len() != 16 {
        return None;
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Some(arr)
}

// =============================================================================
// ACCOUNT ID
// =============================================================================

/// Identity of a principal: committer, beneficiary, escrow or any caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 16]);

impl AccountId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Derive a stable id from an arbitrary label such as a JWT subject.
    pub fn derive(label: &str) -> Self {
        Self(derive_bytes(ACCOUNT_DOMAIN, label))
    }

    /// Derive the id of an account the node itself controls (escrow).
    pub fn service(label: &str) -> Self {
        Self(derive_bytes(SERVICE_DOMAIN, label))
    }

    /// Parse from a UUID string or 32 hex characters.
    pub fn parse(s: &str) -> Option<Self> {
        parse_bytes(s).map(Self)
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// =============================================================================
// TOKEN ADDRESS
// =============================================================================

/// Address of a fungible token contract held by the token collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenAddress(pub [u8; 16]);

impl TokenAddress {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Derive a stable address from a token symbol.
    pub fn derive(symbol: &str) -> Self {
        Self(derive_bytes(TOKEN_DOMAIN, symbol))
    }

    /// Parse from a UUID string or 32 hex characters.
    pub fn parse(s: &str) -> Option<Self> {
        parse_bytes(s).map(Self)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
