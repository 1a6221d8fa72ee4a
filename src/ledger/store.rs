//! Commitment Ledger
//!
//! Owns every commitment record and enforces per-record invariants.
//! Uses BTreeMap for deterministic iteration order.
//!
//! Mutations require a [`MutatorCapability`], handed out once per loaded
//! ledger. Every operation either applies completely or returns an error
//! with the ledger untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::hash::{hash_with_domain, Digest, RecordHasher};
use crate::core::identity::AccountId;
use crate::core::time::{window_end, Timestamp};
use crate::core::Amount;
use crate::ledger::error::LedgerError;
use crate::ledger::events::{LedgerEvent, LedgerEventData};
use crate::ledger::record::{
    Asset, CommitmentRecord, Progress, RecordId, RecordStatus, Schedule, Stake, Verdict,
};

/// Domain separator for snapshot checksums.
const SNAPSHOT_DOMAIN: &[u8] = b"HABIT_STAKE_SNAPSHOT_V1";

/// Proof of being the ledger's sole authorized mutator.
///
/// Not `Clone`: whoever holds it is the only principal able to mutate.
#[derive(Debug)]
pub struct MutatorCapability {
    ledger: [u8; 16],
}

/// Result of a successful progress registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    /// Completed periods after this registration.
    pub chain: u32,
    /// Registrations in the (possibly new) current period.
    pub period_times_accomplished: u32,
    /// Whether this registration completed a period.
    pub period_completed: bool,
}

/// What the custody layer must release for a settled claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Record settled.
    pub id: RecordId,
    /// Who receives the stake.
    pub recipient: AccountId,
    /// Asset to release.
    pub asset: Asset,
    /// Exact amount to release.
    pub amount: Amount,
    /// Verdict the settlement was made under.
    pub verdict: Verdict,
}

/// Parameters for a new record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Committer.
    pub owner: AccountId,
    /// Receives the stake if the commitment breaks.
    pub beneficiary: AccountId,
    /// Habit name.
    pub name: String,
    /// Habit description.
    pub description: String,
    /// Repetition rules.
    pub schedule: Schedule,
    /// Opening of the first period.
    pub start_time: Timestamp,
    /// Asset and amount already in custody.
    pub stake: Stake,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    checksum: Digest,
    payload: Vec<u8>,
}

/// The commitment ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    records: BTreeMap<RecordId, CommitmentRecord>,
    by_owner: BTreeMap<AccountId, BTreeSet<RecordId>>,
    next_id: RecordId,
    #[serde(skip)]
    binding: Option<[u8; 16]>,
    #[serde(skip)]
    pending_events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Create an empty, unbound ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Capability binding
    // -------------------------------------------------------------------------

    /// Hand out the mutator capability. Succeeds at most once.
    pub fn issue_capability(&mut self) -> Result<MutatorCapability, LedgerError> {
        if self.binding.is_some() {
            return Err(LedgerError::CapabilityAlreadyIssued);
        }
        let ledger = *uuid::Uuid::new_v4().as_bytes();
        self.binding = Some(ledger);
        Ok(MutatorCapability { ledger })
    }

    #[cfg(test)]
    pub(crate) fn with_next_id(next_id: RecordId) -> Self {
        Self {
            next_id,
            ..Self::default()
        }
    }

    /// Whether a mutator has been bound.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    fn authorize(&self, cap: &MutatorCapability) -> Result<(), LedgerError> {
        match self.binding {
            Some(bound) if bound == cap.ledger => Ok(()),
            _ => Err(LedgerError::CapabilityMismatch),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Look up a record.
    pub fn get(&self, id: RecordId) -> Option<&CommitmentRecord> {
        self.records.get(&id)
    }

    /// Look up a record, failing with `NotFound`.
    pub fn record(&self, id: RecordId) -> Result<&CommitmentRecord, LedgerError> {
        self.records.get(&id).ok_or(LedgerError::NotFound(id))
    }

    /// All records in id order, claimed ones included.
    pub fn records(&self) -> impl Iterator<Item = &CommitmentRecord> {
        self.records.values()
    }

    /// Ids of records currently owned by `owner`, ascending.
    pub fn records_of(&self, owner: &AccountId) -> Vec<RecordId> {
        self.by_owner
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was ever created.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Claim eligibility of a record at `now`. Never mutates.
    pub fn evaluate(&self, id: RecordId, now: Timestamp) -> Result<Verdict, LedgerError> {
        Ok(self.record(id)?.verdict(now))
    }

    /// Progress summary of a record at `now`.
    pub fn status(&self, id: RecordId, now: Timestamp) -> Result<RecordStatus, LedgerError> {
        Ok(self.record(id)?.status(now))
    }

    /// Digest over every record, in id order.
    pub fn state_digest(&self) -> Digest {
        let mut h = RecordHasher::for_ledger();
        h.update_u64(self.next_id);
        for record in self.records.values() {
            h.update_digest(&record.digest());
        }
        h.finalize()
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Check creation parameters without touching state.
    pub fn validate_new(new: &NewRecord) -> Result<(), LedgerError> {
        new.schedule.validate()?;
        if new.stake.amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if window_end(new.start_time, new.schedule.timeframe_seconds).is_none() {
            return Err(LedgerError::InvalidSchedule("first period end overflows"));
        }
        Ok(())
    }

    /// Allocate a new record with zero progress. Returns its id.
    ///
    /// `start_time` may lie in the future; the record is then not yet started.
    pub fn create_record(
        &mut self,
        cap: &MutatorCapability,
        new: NewRecord,
        now: Timestamp,
    ) -> Result<RecordId, LedgerError> {
        self.authorize(cap)?;
        Self::validate_new(&new)?;

        let progress = Progress::starting_at(new.start_time, &new.schedule)
            .ok_or(LedgerError::InvalidSchedule("first period end overflows"))?;

        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(LedgerError::IdsExhausted)?;
        let record = CommitmentRecord {
            id,
            owner: new.owner,
            name: new.name,
            description: new.description,
            beneficiary: new.beneficiary,
            schedule: new.schedule,
            progress,
            stake: new.stake,
            claimed: false,
        };

        self.pending_events.push(LedgerEvent::new(
            now,
            id,
            LedgerEventData::RecordCreated {
                owner: record.owner,
                beneficiary: record.beneficiary,
                asset: record.stake.asset,
                amount: record.stake.amount,
                period_start: record.progress.period_start,
            },
        ));
        self.by_owner.entry(record.owner).or_default().insert(id);
        self.records.insert(id, record);
        self.next_id = next_id;

        Ok(id)
    }

    /// Register one unit of progress for the owner.
    ///
    /// Checked in order: record exists, caller owns it, not claimed,
    /// period opened, deadline not passed.
    pub fn advance(
        &mut self,
        cap: &MutatorCapability,
        id: RecordId,
        caller: &AccountId,
        proof: String,
        now: Timestamp,
    ) -> Result<AdvanceOutcome, LedgerError> {
        self.authorize(cap)?;
        let record = self.records.get_mut(&id).ok_or(LedgerError::NotFound(id))?;

        if record.owner != *caller {
            return Err(LedgerError::Unauthorized { id, caller: *caller });
        }
        if record.claimed {
            return Err(LedgerError::AlreadyClaimed(id));
        }
        if now < record.progress.period_start {
            return Err(LedgerError::PeriodNotStarted {
                id,
                period_start: record.progress.period_start,
            });
        }
        if now > record.progress.period_end {
            return Err(LedgerError::InvalidState {
                id,
                broken: record.is_broken(now) && !record.chain_accomplished(),
            });
        }

        let accomplished = record.progress.period_times_accomplished + 1;
        let completes = accomplished == record.schedule.times_per_timeframe;

        if !completes {
            record.progress.period_times_accomplished = accomplished;
            record.progress.proofs.push(proof);
            self.pending_events.push(LedgerEvent::new(
                now,
                id,
                LedgerEventData::ProgressRegistered { period_times_accomplished: accomplished },
            ));
            return Ok(AdvanceOutcome {
                chain: record.progress.chain,
                period_times_accomplished: accomplished,
                period_completed: false,
            });
        }

        // Compute the rolled window before touching anything.
        let next_start = record.progress.period_end;
        let next_end = window_end(next_start, record.schedule.timeframe_seconds)
            .ok_or(LedgerError::PeriodOverflow(id))?;
        let chain = record.progress.chain.saturating_add(1);

        record.progress.chain = chain;
        record.progress.period_times_accomplished = 0;
        record.progress.period_start = next_start;
        record.progress.period_end = next_end;
        record.progress.proofs.clear();

        self.pending_events.push(LedgerEvent::new(
            now,
            id,
            LedgerEventData::ProgressRegistered { period_times_accomplished: accomplished },
        ));
        self.pending_events.push(LedgerEvent::new(
            now,
            id,
            LedgerEventData::PeriodCompleted {
                chain,
                period_start: next_start,
                period_end: next_end,
            },
        ));

        Ok(AdvanceOutcome {
            chain,
            period_times_accomplished: 0,
            period_completed: true,
        })
    }

    /// Decide who gets the stake and mark the record claimed.
    ///
    /// Owner claims require `caller == owner`. Beneficiary claims may be
    /// triggered by anyone.
    pub fn settle_claim(
        &mut self,
        cap: &MutatorCapability,
        id: RecordId,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<Settlement, LedgerError> {
        self.authorize(cap)?;
        let record = self.records.get_mut(&id).ok_or(LedgerError::NotFound(id))?;

        if record.claimed {
            return Err(LedgerError::AlreadyClaimed(id));
        }

        let verdict = record.verdict(now);
        let recipient = match verdict {
            Verdict::OwnerClaimable => {
                if record.owner != *caller {
                    return Err(LedgerError::Unauthorized { id, caller: *caller });
                }
                record.owner
            }
            Verdict::BeneficiaryClaimable => record.beneficiary,
            Verdict::InProgress => {
                if now < record.progress.period_start {
                    return Err(LedgerError::PeriodNotStarted {
                        id,
                        period_start: record.progress.period_start,
                    });
                }
                return Err(LedgerError::ChainCommitmentAccomplished { id, accomplished: false });
            }
        };

        record.claimed = true;
        let settlement = Settlement {
            id,
            recipient,
            asset: record.stake.asset,
            amount: record.stake.amount,
            verdict,
        };

        self.pending_events.push(LedgerEvent::new(
            now,
            id,
            LedgerEventData::StakeReleased {
                recipient,
                asset: settlement.asset,
                amount: settlement.amount,
                verdict,
            },
        ));

        Ok(settlement)
    }

    /// Undo a settlement whose custody release failed.
    ///
    /// Drops the `StakeReleased` event the settlement queued.
    pub(crate) fn rollback_claim(
        &mut self,
        cap: &MutatorCapability,
        id: RecordId,
    ) -> Result<(), LedgerError> {
        self.authorize(cap)?;
        let record = self.records.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        record.claimed = false;
        if let Some(pos) = self
            .pending_events
            .iter()
            .rposition(|e| e.record_id == id && e.is_release())
        {
            self.pending_events.remove(pos);
        }
        Ok(())
    }

    /// Move a record to a new owner. Only the current owner may do this.
    pub fn transfer_record_ownership(
        &mut self,
        cap: &MutatorCapability,
        id: RecordId,
        caller: &AccountId,
        new_owner: AccountId,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.authorize(cap)?;
        let record = self.records.get_mut(&id).ok_or(LedgerError::NotFound(id))?;

        if record.owner != *caller {
            return Err(LedgerError::Unauthorized { id, caller: *caller });
        }
        if record.claimed {
            return Err(LedgerError::AlreadyClaimed(id));
        }

        let previous = record.owner;
        record.owner = new_owner;

        if let Some(ids) = self.by_owner.get_mut(&previous) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_owner.remove(&previous);
            }
        }
        self.by_owner.entry(new_owner).or_default().insert(id);

        self.pending_events.push(LedgerEvent::new(
            now,
            id,
            LedgerEventData::OwnershipTransferred { from: previous, to: new_owner },
        ));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Serialize all records with a checksum. Binding is not included.
    pub fn snapshot(&self) -> Result<Vec<u8>, LedgerError> {
        let payload =
            bincode::serialize(self).map_err(|e| LedgerError::SnapshotCorrupt(e.to_string()))?;
        let envelope = SnapshotEnvelope {
            checksum: hash_with_domain(SNAPSHOT_DOMAIN, &payload),
            payload,
        };
        bincode::serialize(&envelope).map_err(|e| LedgerError::SnapshotCorrupt(e.to_string()))
    }

    /// Load a ledger from [`Ledger::snapshot`] bytes. The result is unbound.
    pub fn restore(bytes: &[u8]) -> Result<Self, LedgerError> {
        let envelope: SnapshotEnvelope =
            bincode::deserialize(bytes).map_err(|e| LedgerError::SnapshotCorrupt(e.to_string()))?;
        if hash_with_domain(SNAPSHOT_DOMAIN, &envelope.payload) != envelope.checksum {
            return Err(LedgerError::SnapshotCorrupt("checksum mismatch".into()));
        }
        bincode::deserialize(&envelope.payload)
            .map_err(|e| LedgerError::SnapshotCorrupt(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
