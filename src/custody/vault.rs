//! Escrow Vault
//!
//! Holds staked assets in a single escrow account and moves them per asset
//! variant. The ledger never branches on asset kind; only this layer does.

use crate::core::identity::AccountId;
use crate::core::Amount;
use crate::custody::assets::{CustodyError, NativeLedger, TokenLedger};
use crate::ledger::record::Asset;

/// Escrow account plus the collaborator that keeps its balances.
#[derive(Debug)]
pub struct Vault<B> {
    bank: B,
    escrow: AccountId,
}

impl<B: NativeLedger + TokenLedger> Vault<B> {
    /// Create a vault holding funds under `escrow`.
    pub fn new(bank: B, escrow: AccountId) -> Self {
        Self { bank, escrow }
    }

    /// The escrow account.
    pub fn escrow(&self) -> &AccountId {
        &self.escrow
    }

    /// Move `amount` of `asset` from `from` into escrow.
    ///
    /// Native stakes arrive as value attached by the caller; token stakes are
    /// pulled against an allowance the caller granted the escrow account.
    pub fn pull(&mut self, asset: &Asset, from: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        match asset {
            Asset::Native => self.bank.transfer_native(from, &self.escrow, amount),
            Asset::Token(token) => {
                self.bank
                    .transfer_from(token, &self.escrow, from, &self.escrow, amount)
            }
        }
    }

    /// Move `amount` of `asset` out of escrow to `to`.
    pub fn release(&mut self, asset: &Asset, to: &AccountId, amount: Amount) -> Result<(), CustodyError> {
        match asset {
            Asset::Native => self.bank.transfer_native(&self.escrow, to, amount),
            Asset::Token(token) => self.bank.transfer(token, &self.escrow, to, amount),
        }
    }

    /// Shared access to the collaborator.
    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Exclusive access to the collaborator.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }
}
