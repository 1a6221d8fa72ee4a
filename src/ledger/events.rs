//! Ledger Events
//!
//! Emitted by every successful mutation, in application order.
//! Consumed by the node for broadcasting and by presentation collaborators.

use serde::{Deserialize, Serialize};

use crate::core::identity::AccountId;
use crate::core::time::Timestamp;
use crate::core::Amount;
use crate::ledger::record::{Asset, RecordId, Verdict};

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventData {
    /// A record was created with its stake in custody.
    RecordCreated {
        owner: AccountId,
        beneficiary: AccountId,
        asset: Asset,
        amount: Amount,
        period_start: Timestamp,
    },

    /// A registration was counted towards the current period.
    ProgressRegistered {
        period_times_accomplished: u32,
    },

    /// The current period was completed and the next one opened.
    PeriodCompleted {
        chain: u32,
        period_start: Timestamp,
        period_end: Timestamp,
    },

    /// The stake left custody.
    StakeReleased {
        recipient: AccountId,
        asset: Asset,
        amount: Amount,
        verdict: Verdict,
    },

    /// Record ownership moved to another principal.
    OwnershipTransferred {
        from: AccountId,
        to: AccountId,
    },
}

/// A ledger event with its record and time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Caller-supplied time of the operation.
    pub at: Timestamp,

    /// Record concerned.
    pub record_id: RecordId,

    /// Event data
    pub data: LedgerEventData,
}

impl LedgerEvent {
    /// Create a new event.
    pub fn new(at: Timestamp, record_id: RecordId, data: LedgerEventData) -> Self {
        Self { at, record_id, data }
    }

    /// Whether this event moved funds out of custody.
    pub fn is_release(&self) -> bool {
        matches!(self.data, LedgerEventData::StakeReleased { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_detection() {
        let release = LedgerEvent::new(
            10,
            1,
            LedgerEventData::StakeReleased {
                recipient: AccountId::derive("owner"),
                asset: Asset::Native,
                amount: 5,
                verdict: Verdict::OwnerClaimable,
            },
        );
        let progress = LedgerEvent::new(
            5,
            1,
            LedgerEventData::ProgressRegistered { period_times_accomplished: 1 },
        );

        assert!(release.is_release());
        assert!(!progress.is_release());
    }
}
