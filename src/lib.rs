//! # Habit Stake
//!
//! Habit commitment staking: a deterministic commitment ledger plus a
//! custody layer that holds the staked collateral until the habit is kept
//! or broken.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HABIT STAKE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── identity.rs - Account and token identifiers             │
//! │  ├── time.rs     - Explicit timestamps, window arithmetic    │
//! │  └── hash.rs     - Domain-separated record digests           │
//! │                                                              │
//! │  ledger/         - Commitment ledger (deterministic)         │
//! │  ├── record.rs   - Records, schedules, verdicts              │
//! │  ├── store.rs    - Ledger store and mutator capability       │
//! │  ├── events.rs   - Mutation events                           │
//! │  └── error.rs    - Ledger errors                             │
//! │                                                              │
//! │  custody/        - Staking orchestrator (deterministic)      │
//! │  ├── assets.rs   - Native / token collaborator traits        │
//! │  ├── vault.rs    - Escrow account                            │
//! │  ├── bank.rs     - In-memory collaborator                    │
//! │  └── orchestrator.rs - Public entry point                    │
//! │                                                              │
//! │  network/        - Node (non-deterministic)                  │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── auth.rs     - JWT account binding                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! `core/`, `ledger/` and `custody/` never read a clock and never iterate
//! a hash-ordered collection:
//! - Every time-dependent call takes `now` from its caller
//! - BTreeMap/BTreeSet only
//! - All period arithmetic is checked
//!
//! Given identical operations and timestamps, two ledgers produce the same
//! [`Ledger::state_digest`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod custody;
pub mod ledger;
pub mod network;

// Re-export commonly used types
pub use crate::core::{AccountId, Amount, Timestamp, TokenAddress, UNIT};
pub use crate::custody::{CommitParams, InMemoryBank, StakeError, StakeLimits, StakingOrchestrator};
pub use crate::ledger::{
    Asset, CommitmentRecord, Ledger, LedgerError, LedgerEvent, RecordId, RecordStatus, Schedule,
    Stake, Verdict,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
