//! Core deterministic primitives.
//!
//! Identifiers, explicit timestamps and state digests. Nothing in here
//! reads a clock or iterates a hash-ordered collection.

pub mod hash;
pub mod identity;
pub mod time;

// Re-export core types
pub use hash::{Digest, RecordHasher};
pub use identity::{AccountId, TokenAddress};
pub use time::Timestamp;

/// Quantity of a staked asset, in the asset's smallest unit.
pub type Amount = u128;

/// One whole unit of an 18-decimal asset.
pub const UNIT: Amount = 1_000_000_000_000_000_000;
