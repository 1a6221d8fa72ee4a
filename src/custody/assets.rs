//! Asset Collaborators
//!
//! The orchestrator moves funds through these traits and implements
//! neither. A chain node, a payment rail or [`InMemoryBank`] plugs in here.
//!
//! [`InMemoryBank`]: crate::custody::bank::InMemoryBank

use thiserror::Error;

use crate::core::identity::{AccountId, TokenAddress};
use crate::core::Amount;
use crate::ledger::record::Asset;

/// Failures reported by an asset collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    /// Holder does not have enough of the asset.
    #[error("{holder} holds {available} of {asset:?}, needs {needed}")]
    InsufficientBalance {
        /// Debited account.
        holder: AccountId,
        /// Asset debited.
        asset: Asset,
        /// Requested amount.
        needed: Amount,
        /// Current balance.
        available: Amount,
    },

    /// Spender was not approved for enough of the holder's tokens.
    #[error("{spender} may spend {allowed} of {holder}'s {token}, needs {needed}")]
    InsufficientAllowance {
        /// Token being pulled.
        token: TokenAddress,
        /// Token owner.
        holder: AccountId,
        /// Account pulling the tokens.
        spender: AccountId,
        /// Requested amount.
        needed: Amount,
        /// Current allowance.
        allowed: Amount,
    },

    /// Recipient refused the incoming transfer.
    #[error("{recipient} rejected the transfer")]
    Rejected {
        /// Refusing account.
        recipient: AccountId,
    },

    /// Crediting would overflow the recipient's balance.
    #[error("balance overflow crediting {recipient}")]
    Overflow {
        /// Account that would overflow.
        recipient: AccountId,
    },
}

/// Native-currency collaborator.
pub trait NativeLedger {
    /// Move native currency between accounts.
    fn transfer_native(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Native balance of `holder`.
    fn native_balance(&self, holder: &AccountId) -> Amount;
}

/// Fungible-token collaborator.
pub trait TokenLedger {
    /// Pull `amount` of `holder`'s tokens to `recipient` on behalf of `spender`,
    /// consuming the spender's allowance.
    fn transfer_from(
        &mut self,
        token: &TokenAddress,
        spender: &AccountId,
        holder: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Move `holder`'s own tokens to `recipient`.
    fn transfer(
        &mut self,
        token: &TokenAddress,
        holder: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError>;

    /// Token balance of `holder`.
    fn balance_of(&self, token: &TokenAddress, holder: &AccountId) -> Amount;
}
