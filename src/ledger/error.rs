//! Ledger Errors
//!
//! Every record-scoped failure carries the record id so callers can tell
//! which commitment was rejected and why.

use thiserror::Error;

use crate::core::identity::AccountId;
use crate::core::time::Timestamp;
use crate::ledger::record::RecordId;

/// Errors raised by the commitment ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No record with this id exists.
    #[error("commitment {0} not found")]
    NotFound(RecordId),

    /// Caller lacks the capability required for this operation.
    #[error("{caller} is not permitted to act on commitment {id}")]
    Unauthorized {
        /// Record the caller tried to act on.
        id: RecordId,
        /// Rejected caller.
        caller: AccountId,
    },

    /// Progress registered before the current period opened.
    #[error("commitment {id} period has not started yet (starts at {period_start})")]
    PeriodNotStarted {
        /// Record id.
        id: RecordId,
        /// When the current period opens.
        period_start: Timestamp,
    },

    /// Progress registered after the current period's deadline.
    #[error("commitment {id} is not in a valid state for progress (broken: {broken})")]
    InvalidState {
        /// Record id.
        id: RecordId,
        /// True when the stake is now forfeit to the beneficiary.
        broken: bool,
    },

    /// Owner claim attempted before the chain target was reached.
    #[error("commitment {id} chain accomplished: {accomplished}")]
    ChainCommitmentAccomplished {
        /// Record id.
        id: RecordId,
        /// Whether the chain target has been reached.
        accomplished: bool,
    },

    /// The stake of this record was already released.
    #[error("commitment {0} stake already claimed")]
    AlreadyClaimed(RecordId),

    /// Rolling the period would overflow the timestamp range.
    #[error("commitment {0} period end overflows the timestamp range")]
    PeriodOverflow(RecordId),

    /// Schedule parameters rejected at creation.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(&'static str),

    /// Stake amount must be positive.
    #[error("stake amount must be greater than zero")]
    InvalidAmount,

    /// The mutator capability was already handed out.
    #[error("ledger mutator capability already issued")]
    CapabilityAlreadyIssued,

    /// A capability issued by a different ledger (or none) was presented.
    #[error("capability does not belong to this ledger")]
    CapabilityMismatch,

    /// The record id space is used up.
    #[error("no record ids left")]
    IdsExhausted,

    /// Snapshot bytes could not be decoded or failed their checksum.
    #[error("snapshot corrupt: {0}")]
    SnapshotCorrupt(String),
}

impl LedgerError {
    /// Record id named by this error, if it is record-scoped.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::NotFound(id)
            | Self::AlreadyClaimed(id)
            | Self::PeriodOverflow(id)
            | Self::Unauthorized { id, .. }
            | Self::PeriodNotStarted { id, .. }
            | Self::InvalidState { id, .. }
            | Self::ChainCommitmentAccomplished { id, .. } => Some(*id),
            Self::InvalidSchedule(_)
            | Self::InvalidAmount
            | Self::CapabilityAlreadyIssued
            | Self::CapabilityMismatch
            | Self::IdsExhausted
            | Self::SnapshotCorrupt(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_record_and_condition() {
        let err = LedgerError::InvalidState { id: 0, broken: true };
        assert_eq!(
            err.to_string(),
            "commitment 0 is not in a valid state for progress (broken: true)"
        );

        let err = LedgerError::ChainCommitmentAccomplished { id: 3, accomplished: false };
        assert_eq!(err.to_string(), "commitment 3 chain accomplished: false");
    }

    #[test]
    fn test_record_id_extraction() {
        assert_eq!(LedgerError::AlreadyClaimed(9).record_id(), Some(9));
        assert_eq!(
            LedgerError::Unauthorized { id: 4, caller: AccountId::default() }.record_id(),
            Some(4)
        );
        assert_eq!(LedgerError::InvalidAmount.record_id(), None);
    }
}
