//! Custody Module
//!
//! Everything that touches funds. The ledger decides who is owed what;
//! this module moves it.
//!
//! ## Module Structure
//!
//! - `assets`: Native and token collaborator traits plus their errors
//! - `bank`: In-memory collaborator used by the node and tests
//! - `vault`: Escrow account and per-asset transfers
//! - `orchestrator`: Public entry point wrapping the ledger

pub mod assets;
pub mod bank;
pub mod orchestrator;
pub mod vault;

// Re-export key types
pub use assets::{CustodyError, NativeLedger, TokenLedger};
pub use bank::{Allocation, InMemoryBank};
pub use orchestrator::{CommitParams, StakeError, StakeLimits, StakingOrchestrator};
pub use vault::Vault;
