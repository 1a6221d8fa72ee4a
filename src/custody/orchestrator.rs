//! Staking Orchestrator
//!
//! The only public entry point for end users. Takes stakes into custody,
//! drives the ledger, and releases custody on claim.
//!
//! Each operation is one unit of work: it either applies to both the
//! ledger and the vault or leaves both untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::core::identity::{AccountId, TokenAddress};
use crate::core::time::Timestamp;
use crate::core::Amount;
use crate::custody::assets::{CustodyError, NativeLedger, TokenLedger};
use crate::custody::vault::Vault;
use crate::ledger::events::LedgerEvent;
use crate::ledger::record::{
    Asset, CommitmentRecord, RecordId, RecordStatus, Schedule, Stake, Verdict,
};
use crate::ledger::store::{AdvanceOutcome, Ledger, MutatorCapability, NewRecord, Settlement};
use crate::ledger::LedgerError;

/// Boundary length limits for user-supplied text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeLimits {
    /// Maximum habit name length in bytes.
    pub max_name_len: usize,
    /// Maximum description length in bytes.
    pub max_description_len: usize,
    /// Maximum proof length in bytes.
    pub max_proof_len: usize,
}

impl Default for StakeLimits {
    fn default() -> Self {
        Self {
            max_name_len: 64,
            max_description_len: 300,
            max_proof_len: 256,
        }
    }
}

impl StakeLimits {
    /// Create limits from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: usize| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            max_name_len: read("HABIT_MAX_NAME_LEN", defaults.max_name_len),
            max_description_len: read("HABIT_MAX_DESCRIPTION_LEN", defaults.max_description_len),
            max_proof_len: read("HABIT_MAX_PROOF_LEN", defaults.max_proof_len),
        }
    }
}

/// What a committer fills in when creating a habit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitParams {
    /// Habit name.
    pub name: String,
    /// Habit description.
    pub description: String,
    /// Receives the stake if the commitment breaks.
    pub beneficiary: AccountId,
    /// Repetition rules.
    pub schedule: Schedule,
}

/// Errors surfaced to orchestrator callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    /// Ledger rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Text fields outside the boundary limits, or the escrow account
    /// named as a party.
    #[error("invalid commitment parameters: {0}")]
    InvalidParams(String),

    /// The stake could not be taken into custody.
    #[error("stake could not be taken into custody: {0}")]
    Custody(#[from] CustodyError),

    /// Releasing custody failed; the claim was rolled back.
    #[error("commitment {id} stake transfer failed: {reason}")]
    TransferFailed {
        /// Record whose claim was rolled back.
        id: RecordId,
        /// Collaborator failure.
        reason: CustodyError,
    },
}

impl StakeError {
    /// Record id named by this error, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::Ledger(e) => e.record_id(),
            Self::TransferFailed { id, .. } => Some(*id),
            Self::InvalidParams(_) | Self::Custody(_) => None,
        }
    }
}

/// Custody wrapper around the commitment ledger.
#[derive(Debug)]
pub struct StakingOrchestrator<B> {
    ledger: Ledger,
    cap: MutatorCapability,
    vault: Vault<B>,
    limits: StakeLimits,
}

impl<B: NativeLedger + TokenLedger> StakingOrchestrator<B> {
    /// Bind to `ledger` as its sole mutator and hold stakes under `escrow`.
    pub fn new(
        mut ledger: Ledger,
        bank: B,
        escrow: AccountId,
        limits: StakeLimits,
    ) -> Result<Self, StakeError> {
        let cap = ledger.issue_capability()?;
        info!("orchestrator bound to ledger with {} records, escrow {}", ledger.len(), escrow);
        Ok(Self {
            ledger,
            cap,
            vault: Vault::new(bank, escrow),
            limits,
        })
    }

    // -------------------------------------------------------------------------
    // Write surface
    // -------------------------------------------------------------------------

    /// Stake native currency attached as `value`.
    #[instrument(skip_all, fields(caller = %caller.short(), value = value))]
    pub fn commit_native(
        &mut self,
        caller: &AccountId,
        params: CommitParams,
        start_time: Timestamp,
        value: Amount,
        now: Timestamp,
    ) -> Result<RecordId, StakeError> {
        self.commit_stake(caller, params, start_time, Stake::native(value), now)
    }

    /// Stake `amount` of `token`, pulled against the caller's allowance.
    #[instrument(skip_all, fields(caller = %caller.short(), token = %token, amount = amount))]
    pub fn commit(
        &mut self,
        caller: &AccountId,
        params: CommitParams,
        start_time: Timestamp,
        token: TokenAddress,
        amount: Amount,
        now: Timestamp,
    ) -> Result<RecordId, StakeError> {
        self.commit_stake(caller, params, start_time, Stake::token(token, amount), now)
    }

    fn commit_stake(
        &mut self,
        caller: &AccountId,
        params: CommitParams,
        start_time: Timestamp,
        stake: Stake,
        now: Timestamp,
    ) -> Result<RecordId, StakeError> {
        self.check_parties(caller, &params.beneficiary)?;
        self.check_text(&params)?;

        let new = NewRecord {
            owner: *caller,
            beneficiary: params.beneficiary,
            name: params.name,
            description: params.description,
            schedule: params.schedule,
            start_time,
            stake,
        };
        Ledger::validate_new(&new)?;

        self.vault.pull(&stake.asset, caller, stake.amount)?;

        match self.ledger.create_record(&self.cap, new, now) {
            Ok(id) => {
                info!(id, "commitment created, {} of {:?} in custody", stake.amount, stake.asset);
                self.trace_digest();
                Ok(id)
            }
            Err(e) => {
                if let Err(refund) = self.vault.release(&stake.asset, caller, stake.amount) {
                    error!("refund after failed creation did not complete: {}", refund);
                }
                Err(e.into())
            }
        }
    }

    /// Register one unit of progress with an opaque proof.
    #[instrument(skip_all, fields(id = id, caller = %caller.short()))]
    pub fn register_progress(
        &mut self,
        caller: &AccountId,
        id: RecordId,
        proof: String,
        now: Timestamp,
    ) -> Result<AdvanceOutcome, StakeError> {
        if proof.len() > self.limits.max_proof_len {
            return Err(StakeError::InvalidParams(format!(
                "proof exceeds {} bytes",
                self.limits.max_proof_len
            )));
        }

        let outcome = self.ledger.advance(&self.cap, id, caller, proof, now)?;
        if outcome.period_completed {
            info!(id, chain = outcome.chain, "period completed");
        } else {
            debug!(id, done = outcome.period_times_accomplished, "progress registered");
        }
        self.trace_digest();
        Ok(outcome)
    }

    /// Settle a claim and release the stake to the entitled recipient.
    ///
    /// `claimed` is set before the release; a failed release rolls it back.
    #[instrument(skip_all, fields(id = id, caller = %caller.short()))]
    pub fn claim(
        &mut self,
        caller: &AccountId,
        id: RecordId,
        now: Timestamp,
    ) -> Result<Settlement, StakeError> {
        let settlement = self
            .ledger
            .settle_claim(&self.cap, id, caller, now)
            .inspect_err(|e| warn!("claim rejected: {}", e))?;

        if let Err(reason) =
            self.vault
                .release(&settlement.asset, &settlement.recipient, settlement.amount)
        {
            warn!("release to {} failed, rolling back claim: {}", settlement.recipient, reason);
            self.ledger.rollback_claim(&self.cap, id)?;
            return Err(StakeError::TransferFailed { id, reason });
        }

        info!(
            id,
            recipient = %settlement.recipient,
            amount = settlement.amount,
            "stake released ({:?})",
            settlement.verdict
        );
        self.trace_digest();
        Ok(settlement)
    }

    /// Hand a record to a new owner.
    #[instrument(skip_all, fields(id = id, caller = %caller.short(), new_owner = %new_owner.short()))]
    pub fn transfer_record(
        &mut self,
        caller: &AccountId,
        id: RecordId,
        new_owner: AccountId,
        now: Timestamp,
    ) -> Result<(), StakeError> {
        self.check_parties(&new_owner, &new_owner)?;
        self.ledger
            .transfer_record_ownership(&self.cap, id, caller, new_owner, now)?;
        info!(id, "record ownership transferred");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read surface
    // -------------------------------------------------------------------------

    /// Full record by id.
    pub fn record(&self, id: RecordId) -> Result<&CommitmentRecord, StakeError> {
        Ok(self.ledger.record(id)?)
    }

    /// Claim eligibility at `now`.
    pub fn evaluate(&self, id: RecordId, now: Timestamp) -> Result<Verdict, StakeError> {
        Ok(self.ledger.evaluate(id, now)?)
    }

    /// Progress summary at `now`.
    pub fn status(&self, id: RecordId, now: Timestamp) -> Result<RecordStatus, StakeError> {
        Ok(self.ledger.status(id, now)?)
    }

    /// Records owned by `owner`.
    pub fn records_of(&self, owner: &AccountId) -> Vec<RecordId> {
        self.ledger.records_of(owner)
    }

    /// Sum of unclaimed stakes of `asset`.
    pub fn custodied(&self, asset: &Asset) -> Amount {
        self.ledger
            .records()
            .filter(|r| !r.claimed && r.stake.asset == *asset)
            .map(|r| r.stake.amount)
            .sum()
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The escrow vault.
    pub fn vault(&self) -> &Vault<B> {
        &self.vault
    }

    /// Exclusive access to the asset collaborator (deposits, approvals).
    pub fn bank_mut(&mut self) -> &mut B {
        self.vault.bank_mut()
    }

    /// Limits applied to user text.
    pub fn limits(&self) -> &StakeLimits {
        &self.limits
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.ledger.drain_events()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Escrow may neither own nor receive a stake: moving funds from escrow
    /// to itself is a no-op the ledger would still count.
    fn check_parties(&self, owner: &AccountId, beneficiary: &AccountId) -> Result<(), StakeError> {
        let escrow = self.vault.escrow();
        if owner == escrow {
            return Err(StakeError::InvalidParams("escrow account cannot own a commitment".into()));
        }
        if beneficiary == escrow {
            return Err(StakeError::InvalidParams("escrow account cannot be a beneficiary".into()));
        }
        Ok(())
    }

    fn check_text(&self, params: &CommitParams) -> Result<(), StakeError> {
        if params.name.trim().is_empty() {
            return Err(StakeError::InvalidParams("name must not be empty".into()));
        }
        if params.name.len() > self.limits.max_name_len {
            return Err(StakeError::InvalidParams(format!(
                "name exceeds {} bytes",
                self.limits.max_name_len
            )));
        }
        if params.description.len() > self.limits.max_description_len {
            return Err(StakeError::InvalidParams(format!(
                "description exceeds {} bytes",
                self.limits.max_description_len
            )));
        }
        Ok(())
    }

    #[cfg(feature = "debug-tracing")]
    fn trace_digest(&self) {
        debug!(digest = %hex::encode(self.ledger.state_digest()), "ledger digest");
    }

    #[cfg(not(feature = "debug-tracing"))]
    #[inline]
    fn trace_digest(&self) {}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::{DAY, HOUR};
    use crate::core::UNIT;
    use crate::custody::bank::InMemoryBank;

    const T: Timestamp = 1_700_000_000;

    fn owner() -> AccountId {
        AccountId::derive("owner")
    }

    fn beneficiary() -> AccountId {
        AccountId::derive("beneficiary")
    }

    fn third_party() -> AccountId {
        AccountId::derive("third-party")
    }

    fn escrow() -> AccountId {
        AccountId::derive("escrow")
    }

    fn token() -> TokenAddress {
        TokenAddress::derive("TOKEN")
    }

    fn params(schedule: Schedule) -> CommitParams {
        CommitParams {
            name: "habitName".into(),
            description: "habitDescription".into(),
            beneficiary: beneficiary(),
            schedule,
        }
    }

    fn orchestrator() -> StakingOrchestrator<InMemoryBank> {
        let mut bank = InMemoryBank::new();
        bank.mint_native(owner(), 100 * UNIT);
        bank.mint(token(), owner(), 10_000 * UNIT);
        StakingOrchestrator::new(Ledger::new(), bank, escrow(), StakeLimits::default()).unwrap()
    }

    fn native_balance(o: &StakingOrchestrator<InMemoryBank>, who: &AccountId) -> Amount {
        o.vault().bank().native_balance(who)
    }

    fn token_balance(o: &StakingOrchestrator<InMemoryBank>, who: &AccountId) -> Amount {
        o.vault().bank().balance_of(&token(), who)
    }

    #[test]
    fn test_orchestrator_binds_once() {
        let mut ledger = Ledger::new();
        let _cap = ledger.issue_capability().unwrap();
        let err = StakingOrchestrator::new(ledger, InMemoryBank::new(), escrow(), StakeLimits::default());
        assert!(matches!(err, Err(StakeError::Ledger(LedgerError::CapabilityAlreadyIssued))));
    }

    #[test]
    fn test_commit_native_custodies_value() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();

        let r = o.record(id).unwrap();
        assert_eq!(r.stake, Stake::native(UNIT));
        assert_eq!(r.progress.period_end, T + DAY);
        assert_eq!(native_balance(&o, &owner()), 99 * UNIT);
        assert_eq!(native_balance(&o, &escrow()), UNIT);
        assert_eq!(o.custodied(&Asset::Native), UNIT);
    }

    #[test]
    fn test_commit_token_requires_allowance() {
        let mut o = orchestrator();
        let err = o.commit(&owner(), params(Schedule::new(DAY, 2, 2)), T, token(), 10 * UNIT, T);
        assert!(matches!(err, Err(StakeError::Custody(CustodyError::InsufficientAllowance { .. }))));
        assert!(o.ledger().is_empty());

        o.bank_mut().increase_allowance(token(), owner(), escrow(), 10 * UNIT);
        let id = o.commit(&owner(), params(Schedule::new(DAY, 2, 2)), T, token(), 10 * UNIT, T).unwrap();

        assert_eq!(o.record(id).unwrap().stake, Stake::token(token(), 10 * UNIT));
        assert_eq!(token_balance(&o, &escrow()), 10 * UNIT);
        assert_eq!(o.custodied(&Asset::Token(token())), 10 * UNIT);
    }

    #[test]
    fn test_invalid_commit_moves_no_funds() {
        let mut o = orchestrator();

        let err = o.commit_native(&owner(), params(Schedule::new(DAY, 0, 2)), T, UNIT, T);
        assert!(matches!(err, Err(StakeError::Ledger(LedgerError::InvalidSchedule(_)))));

        let err = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, 0, T);
        assert_eq!(err, Err(StakeError::Ledger(LedgerError::InvalidAmount)));

        let mut long = params(Schedule::new(DAY, 1, 1));
        long.description = "x".repeat(301);
        assert!(matches!(
            o.commit_native(&owner(), long, T, UNIT, T),
            Err(StakeError::InvalidParams(_))
        ));

        let mut blank = params(Schedule::new(DAY, 1, 1));
        blank.name = "  ".into();
        assert!(matches!(
            o.commit_native(&owner(), blank, T, UNIT, T),
            Err(StakeError::InvalidParams(_))
        ));

        assert_eq!(native_balance(&o, &owner()), 100 * UNIT);
        assert!(o.ledger().is_empty());
    }

    #[test]
    fn test_escrow_cannot_commit_unbacked_stake() {
        let mut o = orchestrator();
        o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T).unwrap();

        let mut drain = params(Schedule::new(DAY, 1, 1));
        drain.beneficiary = third_party();
        let err = o.commit_native(&escrow(), drain, T, UNIT, T);
        assert!(matches!(err, Err(StakeError::InvalidParams(_))));

        o.bank_mut().approve(token(), escrow(), escrow(), UNIT);
        let err = o.commit(&escrow(), params(Schedule::new(DAY, 1, 1)), T, token(), UNIT, T);
        assert!(matches!(err, Err(StakeError::InvalidParams(_))));

        assert_eq!(o.ledger().len(), 1);
        assert_eq!(o.custodied(&Asset::Native), UNIT);
        assert_eq!(native_balance(&o, &escrow()), UNIT);
        assert_eq!(native_balance(&o, &third_party()), 0);
    }

    #[test]
    fn test_escrow_cannot_be_beneficiary_or_new_owner() {
        let mut o = orchestrator();
        let mut to_escrow = params(Schedule::new(DAY, 1, 1));
        to_escrow.beneficiary = escrow();
        let err = o.commit_native(&owner(), to_escrow, T, UNIT, T);
        assert!(matches!(err, Err(StakeError::InvalidParams(_))));
        assert_eq!(native_balance(&o, &owner()), 100 * UNIT);

        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T).unwrap();
        let err = o.transfer_record(&owner(), id, escrow(), T);
        assert!(matches!(err, Err(StakeError::InvalidParams(_))));
        assert_eq!(o.record(id).unwrap().owner, owner());
    }

    #[test]
    fn test_failed_creation_refunds_stake() {
        let mut bank = InMemoryBank::new();
        bank.mint_native(owner(), 10 * UNIT);
        let mut o = StakingOrchestrator::new(
            Ledger::with_next_id(RecordId::MAX),
            bank,
            escrow(),
            StakeLimits::default(),
        )
        .unwrap();

        let err = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T);
        assert_eq!(err, Err(StakeError::Ledger(LedgerError::IdsExhausted)));
        assert_eq!(native_balance(&o, &owner()), 10 * UNIT);
        assert_eq!(native_balance(&o, &escrow()), 0);
        assert!(o.ledger().is_empty());
        assert!(o.drain_events().is_empty());
    }

    #[test]
    fn test_native_success_path() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();

        let out = o.register_progress(&owner(), id, "proof1".into(), T + HOUR).unwrap();
        assert_eq!((out.chain, out.period_times_accomplished), (0, 1));

        let out = o.register_progress(&owner(), id, "proof2".into(), T + 2 * HOUR).unwrap();
        assert!(out.period_completed);
        assert_eq!(out.chain, 1);
        assert_eq!(o.record(id).unwrap().progress.period_start, T + DAY);

        o.register_progress(&owner(), id, "proof3".into(), T + DAY + HOUR).unwrap();
        o.register_progress(&owner(), id, "proof4".into(), T + DAY + 2 * HOUR).unwrap();
        assert_eq!(o.record(id).unwrap().progress.chain, 2);
        assert_eq!(o.evaluate(id, T + DAY + 3 * HOUR), Ok(Verdict::OwnerClaimable));

        let before = native_balance(&o, &owner());
        let s = o.claim(&owner(), id, T + DAY + 3 * HOUR).unwrap();

        assert_eq!(s.recipient, owner());
        assert_eq!(native_balance(&o, &owner()), before + UNIT);
        assert_eq!(native_balance(&o, &escrow()), 0);
        assert!(o.record(id).unwrap().claimed);
        assert_eq!(o.custodied(&Asset::Native), 0);
    }

    #[test]
    fn test_token_broken_path() {
        let mut o = orchestrator();
        o.bank_mut().increase_allowance(token(), owner(), escrow(), 10 * UNIT);
        let id = o.commit(&owner(), params(Schedule::new(DAY, 2, 2)), T, token(), 10 * UNIT, T).unwrap();

        o.register_progress(&owner(), id, "proof1".into(), T + HOUR).unwrap();
        let now = T + DAY * 2;
        assert_eq!(o.evaluate(id, now), Ok(Verdict::BeneficiaryClaimable));

        let owner_before = token_balance(&o, &owner());
        let s = o.claim(&third_party(), id, now).unwrap();

        assert_eq!(s.recipient, beneficiary());
        assert_eq!(token_balance(&o, &beneficiary()), 10 * UNIT);
        assert_eq!(token_balance(&o, &owner()), owner_before);
        assert_eq!(token_balance(&o, &third_party()), 0);
        assert!(o.record(id).unwrap().claimed);
    }

    #[test]
    fn test_premature_claim() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();
        o.register_progress(&owner(), id, "proof1".into(), T + HOUR).unwrap();

        let err = o.claim(&owner(), id, T + 2 * HOUR);
        assert_eq!(
            err,
            Err(StakeError::Ledger(LedgerError::ChainCommitmentAccomplished { id, accomplished: false }))
        );
        assert_eq!(native_balance(&o, &escrow()), UNIT);
    }

    #[test]
    fn test_unauthorized_progress_leaves_record() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();
        let before = o.record(id).unwrap().clone();

        let err = o.register_progress(&third_party(), id, "proof1".into(), T + HOUR);
        assert_eq!(
            err,
            Err(StakeError::Ledger(LedgerError::Unauthorized { id, caller: third_party() }))
        );
        assert_eq!(o.record(id).unwrap(), &before);
    }

    #[test]
    fn test_owner_claim_by_other_is_unauthorized() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T).unwrap();
        o.register_progress(&owner(), id, "p".into(), T + HOUR).unwrap();

        let err = o.claim(&third_party(), id, T + 2 * HOUR);
        assert!(matches!(err, Err(StakeError::Ledger(LedgerError::Unauthorized { .. }))));
    }

    #[test]
    fn test_second_claim_rejected() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T).unwrap();
        o.register_progress(&owner(), id, "p".into(), T + HOUR).unwrap();
        o.claim(&owner(), id, T + 2 * HOUR).unwrap();

        let err = o.claim(&owner(), id, T + 3 * HOUR);
        assert_eq!(err, Err(StakeError::Ledger(LedgerError::AlreadyClaimed(id))));
        assert_eq!(native_balance(&o, &owner()), 100 * UNIT);
    }

    #[test]
    fn test_failed_release_rolls_back() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 3)), T, UNIT, T).unwrap();
        o.drain_events();
        o.bank_mut().set_rejects_native(beneficiary(), true);

        let now = T + 2 * DAY;
        let err = o.claim(&third_party(), id, now);
        assert!(matches!(err, Err(StakeError::TransferFailed { id: failed, .. }) if failed == id));
        assert!(!o.record(id).unwrap().claimed);
        assert_eq!(native_balance(&o, &escrow()), UNIT);
        assert!(o.drain_events().is_empty());

        o.bank_mut().set_rejects_native(beneficiary(), false);
        o.claim(&third_party(), id, now).unwrap();
        assert_eq!(native_balance(&o, &beneficiary()), UNIT);
    }

    #[test]
    fn test_transfer_record_moves_claim_rights() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 1, 1)), T, UNIT, T).unwrap();
        o.transfer_record(&owner(), id, third_party(), T).unwrap();
        assert_eq!(o.records_of(&third_party()), vec![id]);

        o.register_progress(&third_party(), id, "p".into(), T + HOUR).unwrap();
        o.claim(&third_party(), id, T + 2 * HOUR).unwrap();
        assert_eq!(native_balance(&o, &third_party()), UNIT);
    }

    #[test]
    fn test_long_proof_rejected() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();
        let err = o.register_progress(&owner(), id, "x".repeat(257), T + HOUR);
        assert!(matches!(err, Err(StakeError::InvalidParams(_))));
        assert_eq!(o.record(id).unwrap().progress.period_times_accomplished, 0);
    }

    #[test]
    fn test_status_for_presentation() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 3, 5)), T + DAY, UNIT, T).unwrap();

        let s = o.status(id, T).unwrap();
        assert!(!s.period_started);
        assert_eq!(s.period_times_left, 3);
        assert_eq!(s.chain_commitment, 5);
        assert_eq!(s.verdict, Verdict::InProgress);
    }

    #[test]
    fn test_error_names_record() {
        let mut o = orchestrator();
        let id = o.commit_native(&owner(), params(Schedule::new(DAY, 2, 2)), T, UNIT, T).unwrap();
        let err = o.register_progress(&owner(), id, "p".into(), T + 30 * DAY).unwrap_err();
        assert_eq!(err.record_id(), Some(id));
        assert!(err.to_string().contains("broken: true"));
    }
}
