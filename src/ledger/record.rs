//! Commitment Records
//!
//! One record per staked habit: schedule, progress, stake and claim flag.
//! Verdicts and status views are pure functions of `(record, now)`.

use serde::{Deserialize, Serialize};

use crate::core::hash::{Digest, RecordHasher};
use crate::core::identity::{AccountId, TokenAddress};
use crate::core::time::{seconds_until, window_end, Timestamp};
use crate::core::Amount;
use crate::ledger::error::LedgerError;

/// Sequential record identifier.
pub type RecordId = u64;

// =============================================================================
// SCHEDULE
// =============================================================================

/// Repetition rules fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Length of one period in seconds.
    pub timeframe_seconds: u64,
    /// Registrations required to complete a period.
    pub times_per_timeframe: u32,
    /// Completed periods required to reclaim the stake.
    pub chain_commitment: u32,
}

impl Schedule {
    /// Create a schedule.
    pub const fn new(timeframe_seconds: u64, times_per_timeframe: u32, chain_commitment: u32) -> Self {
        Self {
            timeframe_seconds,
            times_per_timeframe,
            chain_commitment,
        }
    }

    /// Reject zero-valued parameters.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.timeframe_seconds == 0 {
            return Err(LedgerError::InvalidSchedule("timeframe must be greater than zero"));
        }
        if self.times_per_timeframe == 0 {
            return Err(LedgerError::InvalidSchedule("times per timeframe must be greater than zero"));
        }
        if self.chain_commitment == 0 {
            return Err(LedgerError::InvalidSchedule("chain commitment must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

/// Mutable accounting of the current period and the chain so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Completed periods.
    pub chain: u32,
    /// Opening of the current period (inclusive).
    pub period_start: Timestamp,
    /// Deadline of the current period (inclusive).
    pub period_end: Timestamp,
    /// Registrations made in the current period.
    pub period_times_accomplished: u32,
    /// Proofs submitted in the current period, in order.
    pub proofs: Vec<String>,
}

impl Progress {
    /// Fresh progress with the first period opening at `start`.
    pub fn starting_at(start: Timestamp, schedule: &Schedule) -> Option<Self> {
        Some(Self {
            chain: 0,
            period_start: start,
            period_end: window_end(start, schedule.timeframe_seconds)?,
            period_times_accomplished: 0,
            proofs: Vec::new(),
        })
    }
}

// =============================================================================
// STAKE
// =============================================================================

/// Kind of asset held in custody.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// A fungible token at the given address.
    Token(TokenAddress),
}

impl Asset {
    fn tag(&self) -> u8 {
        match self {
            Asset::Native => 0,
            Asset::Token(_) => 1,
        }
    }
}

/// Exact quantity under custody for one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    /// Asset kind.
    pub asset: Asset,
    /// Amount in the asset's smallest unit.
    pub amount: Amount,
}

impl Stake {
    /// Native-currency stake.
    pub const fn native(amount: Amount) -> Self {
        Self { asset: Asset::Native, amount }
    }

    /// Token stake.
    pub const fn token(address: TokenAddress, amount: Amount) -> Self {
        Self { asset: Asset::Token(address), amount }
    }
}

// =============================================================================
// VERDICT
// =============================================================================

/// Claim eligibility of a record at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Chain target reached; the owner may reclaim the stake.
    OwnerClaimable,
    /// A period deadline passed incomplete; anyone may release the stake
    /// to the beneficiary.
    BeneficiaryClaimable,
    /// Neither outcome applies yet (or the record is settled).
    InProgress,
}

/// Read-only progress summary for presentation collaborators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    /// Record id.
    pub id: RecordId,
    /// Claim eligibility at the queried time.
    pub verdict: Verdict,
    /// Completed periods.
    pub chain: u32,
    /// Target number of periods.
    pub chain_commitment: u32,
    /// Registrations still needed in the current period.
    pub period_times_left: u32,
    /// Whether the current period has opened.
    pub period_started: bool,
    /// Seconds until the current deadline, zero once passed.
    pub seconds_to_deadline: u64,
    /// Stake already released.
    pub claimed: bool,
}

// =============================================================================
// RECORD
// =============================================================================

/// Durable record of one commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    /// Sequential id, immutable.
    pub id: RecordId,
    /// Committer; the only principal allowed to register progress.
    pub owner: AccountId,
    /// Short habit name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Receives the stake if the commitment is broken.
    pub beneficiary: AccountId,
    /// Repetition rules.
    pub schedule: Schedule,
    /// Period and chain accounting.
    pub progress: Progress,
    /// Asset and amount under custody.
    pub stake: Stake,
    /// Set once the stake has been released.
    pub claimed: bool,
}

impl CommitmentRecord {
    /// Whether the chain target has been reached.
    #[inline]
    pub fn chain_accomplished(&self) -> bool {
        self.progress.chain >= self.schedule.chain_commitment
    }

    /// Whether the current period closed without enough registrations.
    #[inline]
    pub fn is_broken(&self, now: Timestamp) -> bool {
        now > self.progress.period_end
            && self.progress.period_times_accomplished < self.schedule.times_per_timeframe
    }

    /// Claim eligibility at `now`.
    ///
    /// Owner eligibility is checked first and never expires.
    pub fn verdict(&self, now: Timestamp) -> Verdict {
        if self.claimed {
            Verdict::InProgress
        } else if self.chain_accomplished() {
            Verdict::OwnerClaimable
        } else if self.is_broken(now) {
            Verdict::BeneficiaryClaimable
        } else {
            Verdict::InProgress
        }
    }

    /// Progress summary at `now`.
    pub fn status(&self, now: Timestamp) -> RecordStatus {
        RecordStatus {
            id: self.id,
            verdict: self.verdict(now),
            chain: self.progress.chain,
            chain_commitment: self.schedule.chain_commitment,
            period_times_left: self
                .schedule
                .times_per_timeframe
                .saturating_sub(self.progress.period_times_accomplished),
            period_started: now >= self.progress.period_start,
            seconds_to_deadline: seconds_until(now, self.progress.period_end),
            claimed: self.claimed,
        }
    }

    /// Deterministic digest over every field.
    pub fn digest(&self) -> Digest {
        let mut h = RecordHasher::for_record();
        h.update_u64(self.id);
        h.update_id(self.owner.as_bytes());
        h.update_str(&self.name);
        h.update_str(&self.description);
        h.update_id(self.beneficiary.as_bytes());

        h.update_u64(self.schedule.timeframe_seconds);
        h.update_u32(self.schedule.times_per_timeframe);
        h.update_u32(self.schedule.chain_commitment);

        h.update_u32(self.progress.chain);
        h.update_u64(self.progress.period_start);
        h.update_u64(self.progress.period_end);
        h.update_u32(self.progress.period_times_accomplished);
        h.update_u64(self.progress.proofs.len() as u64);
        for proof in &self.progress.proofs {
            h.update_str(proof);
        }

        h.update_u8(self.stake.asset.tag());
        if let Asset::Token(address) = &self.stake.asset {
            h.update_id(address.as_bytes());
        }
        h.update_u128(self.stake.amount);
        h.update_bool(self.claimed);
        h.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::DAY;

    fn record(schedule: Schedule, start: Timestamp) -> CommitmentRecord {
        CommitmentRecord {
            id: 0,
            owner: AccountId::derive("owner"),
            name: "run".into(),
            description: "5k".into(),
            beneficiary: AccountId::derive("charity"),
            schedule,
            progress: Progress::starting_at(start, &schedule).unwrap(),
            stake: Stake::native(1),
            claimed: false,
        }
    }

    #[test]
    fn test_schedule_validation() {
        assert!(Schedule::new(DAY, 2, 2).validate().is_ok());
        assert!(Schedule::new(0, 2, 2).validate().is_err());
        assert!(Schedule::new(DAY, 0, 2).validate().is_err());
        assert!(Schedule::new(DAY, 2, 0).validate().is_err());
    }

    #[test]
    fn test_progress_start_overflow() {
        let schedule = Schedule::new(10, 1, 1);
        assert!(Progress::starting_at(u64::MAX - 5, &schedule).is_none());
        let p = Progress::starting_at(100, &schedule).unwrap();
        assert_eq!(p.period_end, 110);
    }

    #[test]
    fn test_deadline_is_inclusive() {
        let r = record(Schedule::new(DAY, 2, 2), 1_000);
        assert_eq!(r.verdict(1_000 + DAY), Verdict::InProgress);
        assert_eq!(r.verdict(1_000 + DAY + 1), Verdict::BeneficiaryClaimable);
    }

    #[test]
    fn test_owner_claim_takes_precedence() {
        let mut r = record(Schedule::new(DAY, 1, 1), 0);
        r.progress.chain = 1;
        assert_eq!(r.verdict(DAY * 100), Verdict::OwnerClaimable);
    }

    #[test]
    fn test_claimed_is_in_progress() {
        let mut r = record(Schedule::new(DAY, 1, 1), 0);
        r.claimed = true;
        assert_eq!(r.verdict(DAY * 100), Verdict::InProgress);
    }

    #[test]
    fn test_status_view() {
        let mut r = record(Schedule::new(DAY, 3, 4), 500);
        r.progress.period_times_accomplished = 1;

        let before = r.status(100);
        assert!(!before.period_started);
        assert_eq!(before.period_times_left, 2);
        assert_eq!(before.seconds_to_deadline, 500 + DAY - 100);

        let after = r.status(500 + DAY + 10);
        assert!(after.period_started);
        assert_eq!(after.seconds_to_deadline, 0);
        assert_eq!(after.verdict, Verdict::BeneficiaryClaimable);
    }

    #[test]
    fn test_digest_tracks_changes() {
        let r = record(Schedule::new(DAY, 2, 2), 0);
        let mut changed = r.clone();
        changed.progress.proofs.push("photo".into());

        assert_eq!(r.digest(), r.clone().digest());
        assert_ne!(r.digest(), changed.digest());

        let mut token = r.clone();
        token.stake = Stake::token(TokenAddress::derive("DAI"), 1);
        assert_ne!(r.digest(), token.digest());
    }
}
