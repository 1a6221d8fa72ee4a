//! Protocol Messages
//!
//! Wire format for client-node communication over WebSocket.
//! Messages are JSON. Amounts travel as decimal strings and identifiers as
//! hex or UUID strings so that any JSON client can round-trip them.

use serde::{Deserialize, Serialize};

use crate::core::identity::{AccountId, TokenAddress};
use crate::core::time::{timeframe_name, Timestamp};
use crate::core::Amount;
use crate::custody::orchestrator::{CommitParams, StakeError};
use crate::ledger::events::{LedgerEvent, LedgerEventData};
use crate::ledger::record::{Asset, CommitmentRecord, RecordId, RecordStatus, Schedule, Verdict};
use crate::ledger::LedgerError;

// =============================================================================
// CLIENT -> NODE MESSAGES
// =============================================================================

/// Messages sent from client to node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to an account.
    Auth(AuthRequest),

    /// Create a habit staking native currency.
    CommitNative(CommitRequest),

    /// Create a habit staking a token. `token` is required.
    Commit(CommitRequest),

    /// Raise the escrow's allowance over the caller's tokens.
    Approve { token: String, amount: String },

    /// Register progress on a habit.
    RegisterProgress { id: RecordId, proof: String },

    /// Claim a settled stake.
    Claim { id: RecordId },

    /// Hand a habit to another account.
    TransferRecord { id: RecordId, new_owner: String },

    /// Fetch a full record.
    GetRecord { id: RecordId },

    /// Fetch the progress summary of a record.
    GetStatus { id: RecordId },

    /// List record ids of an account (the caller's if omitted).
    ListRecords {
        #[serde(default)]
        owner: Option<String>,
    },

    /// Balance of the caller (or `account`) in `asset` ("native" or token).
    Balance {
        asset: String,
        #[serde(default)]
        account: Option<String>,
    },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// JWT issued by the identity provider.
    pub token: String,
}

/// Create-habit form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Habit name.
    pub name: String,
    /// Habit description.
    #[serde(default)]
    pub description: String,
    /// Beneficiary account (UUID or hex).
    pub beneficiary: String,
    /// Period length in seconds.
    pub timeframe_seconds: u64,
    /// Registrations required per period.
    pub times_per_timeframe: u32,
    /// Completed periods required.
    pub chain_commitment: u32,
    /// Opening of the first period.
    pub start_time: Timestamp,
    /// Stake amount (decimal string, smallest unit).
    pub amount: String,
    /// Token address for token stakes.
    #[serde(default)]
    pub token: Option<String>,
}

impl CommitRequest {
    /// Parse the form into orchestrator parameters and stake amount.
    pub fn to_params(&self) -> Result<(CommitParams, Amount), String> {
        let beneficiary = parse_account(&self.beneficiary)?;
        let amount = parse_amount(&self.amount)?;
        let params = CommitParams {
            name: self.name.clone(),
            description: self.description.clone(),
            beneficiary,
            schedule: Schedule::new(
                self.timeframe_seconds,
                self.times_per_timeframe,
                self.chain_commitment,
            ),
        };
        Ok((params, amount))
    }
}

// =============================================================================
// NODE -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from node to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// A habit was created.
    Committed { id: RecordId },

    /// Allowance raised.
    Approved { token: String, allowance: String },

    /// Progress accepted.
    ProgressRegistered {
        id: RecordId,
        chain: u32,
        period_times_accomplished: u32,
        period_completed: bool,
    },

    /// Stake released.
    Claimed {
        id: RecordId,
        recipient: String,
        amount: String,
        verdict: Verdict,
    },

    /// Full record.
    Record(RecordView),

    /// Progress summary.
    Status(RecordStatus),

    /// Record ids of an account.
    Records { owner: String, ids: Vec<RecordId> },

    /// Balance answer.
    Balance {
        account: String,
        asset: String,
        amount: String,
    },

    /// Ledger event broadcast to every connection.
    Event(EventView),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Node is shutting down.
    Shutdown { reason: String },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Bound account if successful.
    pub account: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Node version.
    pub server_version: String,
}

/// JSON-safe rendering of a [`CommitmentRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    /// Record id.
    pub id: RecordId,
    /// Owner account.
    pub owner: String,
    /// Beneficiary account.
    pub beneficiary: String,
    /// Habit name.
    pub name: String,
    /// Habit description.
    pub description: String,
    /// Period length in seconds.
    pub timeframe_seconds: u64,
    /// "day", "week", "month" or "year" for the preset lengths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    /// Registrations required per period.
    pub times_per_timeframe: u32,
    /// Completed periods required.
    pub chain_commitment: u32,
    /// Completed periods.
    pub chain: u32,
    /// Current period start.
    pub period_start: Timestamp,
    /// Current period end.
    pub period_end: Timestamp,
    /// Registrations in the current period.
    pub period_times_accomplished: u32,
    /// Proofs in registration order.
    pub proofs: Vec<String>,
    /// "native" or token address.
    pub asset: String,
    /// Stake amount.
    pub amount: String,
    /// Whether the stake has been released.
    pub claimed: bool,
    /// Record digest (hex).
    pub digest: String,
}

impl From<&CommitmentRecord> for RecordView {
    fn from(r: &CommitmentRecord) -> Self {
        Self {
            id: r.id,
            owner: r.owner.to_string(),
            beneficiary: r.beneficiary.to_string(),
            name: r.name.clone(),
            description: r.description.clone(),
            timeframe_seconds: r.schedule.timeframe_seconds,
            timeframe: timeframe_name(r.schedule.timeframe_seconds).map(str::to_string),
            times_per_timeframe: r.schedule.times_per_timeframe,
            chain_commitment: r.schedule.chain_commitment,
            chain: r.progress.chain,
            period_start: r.progress.period_start,
            period_end: r.progress.period_end,
            period_times_accomplished: r.progress.period_times_accomplished,
            proofs: r.progress.proofs.clone(),
            asset: format_asset(&r.stake.asset),
            amount: r.stake.amount.to_string(),
            claimed: r.claimed,
            digest: hex::encode(r.digest()),
        }
    }
}

/// JSON-safe rendering of a [`LedgerEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    /// When it happened.
    pub at: Timestamp,
    /// Record concerned.
    pub record_id: RecordId,
    /// Event kind (snake_case).
    pub kind: String,
    /// Account the event moved something to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Amount moved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Chain after the event, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<u32>,
}

impl From<&LedgerEvent> for EventView {
    fn from(e: &LedgerEvent) -> Self {
        let (kind, account, amount, chain) = match &e.data {
            LedgerEventData::RecordCreated { owner, amount, .. } => {
                ("record_created", Some(owner.to_string()), Some(amount.to_string()), None)
            }
            LedgerEventData::ProgressRegistered { .. } => ("progress_registered", None, None, None),
            LedgerEventData::PeriodCompleted { chain, .. } => {
                ("period_completed", None, None, Some(*chain))
            }
            LedgerEventData::StakeReleased { recipient, amount, .. } => {
                ("stake_released", Some(recipient.to_string()), Some(amount.to_string()), None)
            }
            LedgerEventData::OwnershipTransferred { to, .. } => {
                ("ownership_transferred", Some(to.to_string()), None, None)
            }
        };
        Self {
            at: e.at,
            record_id: e.record_id,
            kind: kind.to_string(),
            account,
            amount,
            chain,
        }
    }
}

/// Node error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Record the error concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

impl ServerError {
    /// Error with no record attached.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            record_id: None,
        }
    }
}

impl From<&StakeError> for ServerError {
    fn from(err: &StakeError) -> Self {
        Self {
            code: ErrorCode::from(err),
            message: err.to_string(),
            record_id: err.record_id(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Malformed message or field.
    InvalidInput,
    /// No such record.
    NotFound,
    /// Caller may not act on the record.
    Unauthorized,
    /// Current period has not opened.
    PeriodNotStarted,
    /// Record does not accept progress.
    InvalidState,
    /// Claim not yet settled.
    ChainNotAccomplished,
    /// Stake already released.
    AlreadyClaimed,
    /// Schedule, amount or text rejected.
    InvalidParams,
    /// Stake could not be taken into custody.
    CustodyFailed,
    /// Stake could not be released.
    TransferFailed,
    /// Connection limit reached.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl From<&StakeError> for ErrorCode {
    fn from(err: &StakeError) -> Self {
        match err {
            StakeError::Ledger(e) => match e {
                LedgerError::NotFound(_) => ErrorCode::NotFound,
                LedgerError::Unauthorized { .. } => ErrorCode::Unauthorized,
                LedgerError::PeriodNotStarted { .. } => ErrorCode::PeriodNotStarted,
                LedgerError::InvalidState { .. } => ErrorCode::InvalidState,
                LedgerError::ChainCommitmentAccomplished { .. } => ErrorCode::ChainNotAccomplished,
                LedgerError::AlreadyClaimed(_) => ErrorCode::AlreadyClaimed,
                LedgerError::PeriodOverflow(_)
                | LedgerError::InvalidSchedule(_)
                | LedgerError::InvalidAmount => ErrorCode::InvalidParams,
                LedgerError::CapabilityAlreadyIssued
                | LedgerError::CapabilityMismatch
                | LedgerError::IdsExhausted
                | LedgerError::SnapshotCorrupt(_) => ErrorCode::InternalError,
            },
            StakeError::InvalidParams(_) => ErrorCode::InvalidParams,
            StakeError::Custody(_) => ErrorCode::CustodyFailed,
            StakeError::TransferFailed { .. } => ErrorCode::TransferFailed,
        }
    }
}

// =============================================================================
// FIELD HELPERS
// =============================================================================

/// Parse a decimal amount.
pub fn parse_amount(s: &str) -> Result<Amount, String> {
    s.trim()
        .parse::<Amount>()
        .map_err(|e| format!("invalid amount {:?}: {}", s, e))
}

/// Parse an account id (UUID or hex).
pub fn parse_account(s: &str) -> Result<AccountId, String> {
    AccountId::parse(s).ok_or_else(|| format!("invalid account {:?}", s))
}

/// Parse a token address (UUID or hex).
pub fn parse_token(s: &str) -> Result<TokenAddress, String> {
    TokenAddress::parse(s).ok_or_else(|| format!("invalid token {:?}", s))
}

/// Parse "native" or a token address.
pub fn parse_asset(s: &str) -> Result<Asset, String> {
    if s.eq_ignore_ascii_case("native") {
        Ok(Asset::Native)
    } else {
        parse_token(s).map(Asset::Token)
    }
}

/// Render an asset the way [`parse_asset`] reads it.
pub fn format_asset(asset: &Asset) -> String {
    match asset {
        Asset::Native => "native".to_string(),
        Asset::Token(t) => t.to_string(),
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Whether handling this message mutates node state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ClientMessage::CommitNative(_)
                | ClientMessage::Commit(_)
                | ClientMessage::Approve { .. }
                | ClientMessage::RegisterProgress { .. }
                | ClientMessage::Claim { .. }
                | ClientMessage::TransferRecord { .. }
        )
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error reply.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNIT;
    use crate::custody::assets::CustodyError;
    use crate::ledger::record::{Progress, Stake};

    #[test]
    fn test_commit_request_parses() {
        let beneficiary = AccountId::derive("bene");
        let json = format!(
            r#"{{"type":"commit_native","name":"run","beneficiary":"{}","timeframe_seconds":86400,
                "times_per_timeframe":2,"chain_commitment":2,"start_time":100,
                "amount":"1000000000000000000"}}"#,
            beneficiary.to_uuid_string()
        );

        let ClientMessage::CommitNative(req) = ClientMessage::from_json(&json).unwrap() else {
            panic!("wrong message type");
        };
        assert!(req.token.is_none());

        let (params, amount) = req.to_params().unwrap();
        assert_eq!(amount, UNIT);
        assert_eq!(params.beneficiary, beneficiary);
        assert_eq!(params.schedule, Schedule::new(86_400, 2, 2));
        assert_eq!(params.description, "");
    }

    #[test]
    fn test_large_amount_survives_json() {
        let big = u128::MAX / 3;
        let msg = ServerMessage::Claimed {
            id: 4,
            recipient: AccountId::derive("x").to_string(),
            amount: big.to_string(),
            verdict: Verdict::BeneficiaryClaimable,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("beneficiary_claimable"));

        let ServerMessage::Claimed { amount, .. } = ServerMessage::from_json(&json).unwrap() else {
            panic!("wrong message type");
        };
        assert_eq!(parse_amount(&amount), Ok(big));
    }

    #[test]
    fn test_bad_fields_rejected() {
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1e18").is_err());
        assert!(parse_account("nobody").is_err());
        assert_eq!(parse_asset("NATIVE"), Ok(Asset::Native));

        let token = TokenAddress::derive("DAI");
        assert_eq!(parse_asset(&format_asset(&Asset::Token(token))), Ok(Asset::Token(token)));
    }

    #[test]
    fn test_write_classification() {
        assert!(ClientMessage::Claim { id: 0 }.is_write());
        assert!(!ClientMessage::GetStatus { id: 0 }.is_write());
        assert!(!ClientMessage::Ping { timestamp: 1 }.is_write());
    }

    #[test]
    fn test_error_codes_from_stake_errors() {
        let err = StakeError::Ledger(LedgerError::ChainCommitmentAccomplished {
            id: 3,
            accomplished: false,
        });
        let wire = ServerError::from(&err);
        assert_eq!(wire.code, ErrorCode::ChainNotAccomplished);
        assert_eq!(wire.record_id, Some(3));

        let json = ServerMessage::Error(wire).to_json().unwrap();
        assert!(json.contains("chain_not_accomplished"));

        let err = StakeError::TransferFailed {
            id: 9,
            reason: CustodyError::Rejected { recipient: AccountId::derive("r") },
        };
        assert_eq!(ErrorCode::from(&err), ErrorCode::TransferFailed);
    }

    #[test]
    fn test_record_view() {
        let schedule = Schedule::new(86_400, 2, 2);
        let record = CommitmentRecord {
            id: 1,
            owner: AccountId::derive("o"),
            name: "read".into(),
            description: String::new(),
            beneficiary: AccountId::derive("b"),
            schedule,
            progress: Progress::starting_at(50, &schedule).unwrap(),
            stake: Stake::native(7 * UNIT),
            claimed: false,
        };

        let view = RecordView::from(&record);
        assert_eq!(view.asset, "native");
        assert_eq!(view.amount, (7 * UNIT).to_string());
        assert_eq!(view.period_end, 50 + 86_400);
        assert_eq!(view.timeframe.as_deref(), Some("day"));
        assert_eq!(view.digest.len(), 64);

        let mut hourly = record.clone();
        hourly.schedule = Schedule::new(3_600, 2, 2);
        let json = serde_json::to_string(&RecordView::from(&hourly)).unwrap();
        assert!(!json.contains("\"timeframe\""));
    }

    #[test]
    fn test_event_view() {
        let event = LedgerEvent::new(
            10,
            2,
            LedgerEventData::PeriodCompleted { chain: 1, period_start: 5, period_end: 9 },
        );
        let view = EventView::from(&event);
        assert_eq!(view.kind, "period_completed");
        assert_eq!(view.chain, Some(1));

        let json = ServerMessage::Event(view).to_json().unwrap();
        assert!(!json.contains("amount"));
    }
}
