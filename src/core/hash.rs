//! Record Hashing
//!
//! Deterministic SHA-256 digests of ledger state for:
//! - Stable keys handed to external renderers
//! - Verifying that a restored snapshot matches what was saved
//! - Cheap change detection by read-only collaborators

use sha2::{Digest as _, Sha256};

/// Hash output type (256 bits / 32 bytes)
pub type Digest = [u8; 32];

/// Domain separator for a single record.
pub const RECORD_DOMAIN: &[u8] = b"HABIT_STAKE_RECORD_V1";

/// Domain separator for the whole ledger.
pub const LEDGER_DOMAIN: &[u8] = b"HABIT_STAKE_LEDGER_V1";

/// Deterministic hasher for ledger state.
///
/// Wraps SHA-256 with typed helpers. Order of updates is part of the
/// digest format.
pub struct RecordHasher {
    hasher: Sha256,
}

impl RecordHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for one commitment record.
    pub fn for_record() -> Self {
        Self::new(RECORD_DOMAIN)
    }

    /// Create hasher for the full ledger.
    pub fn for_ledger() -> Self {
        Self::new(LEDGER_DOMAIN)
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u128 value (little-endian).
    #[inline]
    pub fn update_u128(&mut self, value: u128) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a 16-byte identifier.
    #[inline]
    pub fn update_id(&mut self, id: &[u8; 16]) {
        self.hasher.update(id);
    }

    /// Update with a length-prefixed string.
    ///
    /// The prefix keeps `("ab", "c")` and `("a", "bc")` distinct.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a previously computed digest.
    #[inline]
    pub fn update_digest(&mut self, digest: &Digest) {
        self.hasher.update(digest);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Digest {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
