//! Commitment Ledger Module
//!
//! Durable record of every commitment and the state machine behind it.
//! 100% deterministic: time only enters through explicit `now` arguments.
//!
//! ## Module Structure
//!
//! - `record`: Record, schedule, progress, stake and verdict types
//! - `store`: The ledger itself and its mutator capability
//! - `events`: Events emitted by successful mutations
//! - `error`: Ledger error taxonomy

pub mod error;
pub mod events;
pub mod record;
pub mod store;

// Re-export key types
pub use error::LedgerError;
pub use events::{LedgerEvent, LedgerEventData};
pub use record::{
    Asset, CommitmentRecord, Progress, RecordId, RecordStatus, Schedule, Stake, Verdict,
};
pub use store::{AdvanceOutcome, Ledger, MutatorCapability, NewRecord, Settlement};
