//! In-Memory Asset Bank
//!
//! Native balances, token balances and allowances held in BTreeMaps.
//! Backs the node, the demo and the tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::identity::{AccountId, TokenAddress};
use crate::core::Amount;
use crate::custody::assets::{CustodyError, NativeLedger, TokenLedger};
use crate::ledger::record::Asset;

/// One genesis allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Credited account (UUID or hex).
    pub account: String,
    /// Asset credited.
    pub asset: Asset,
    /// Amount credited.
    pub amount: Amount,
}

/// Simple custodial bank implementing both asset collaborator traits.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryBank {
    native: BTreeMap<AccountId, Amount>,
    tokens: BTreeMap<(TokenAddress, AccountId), Amount>,
    allowances: BTreeMap<(TokenAddress, AccountId, AccountId), Amount>,
    rejects_native: BTreeSet<AccountId>,
}

impl InMemoryBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bank from genesis allocations, skipping unparsable accounts.
    pub fn from_allocations(allocations: &[Allocation]) -> Self {
        let mut bank = Self::new();
        for alloc in allocations {
            let Some(account) = AccountId::parse(&alloc.account) else {
                tracing::warn!("skipping genesis allocation for unparsable account {}", alloc.account);
                continue;
            };
            match alloc.asset {
                Asset::Native => bank.mint_native(account, alloc.amount),
                Asset::Token(token) => bank.mint(token, account, alloc.amount),
            }
        }
        bank
    }

    /// Credit native currency out of thin air.
    pub fn mint_native(&mut self, holder: AccountId, amount: Amount) {
        let balance = self.native.entry(holder).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Credit tokens out of thin air.
    pub fn mint(&mut self, token: TokenAddress, holder: AccountId, amount: Amount) {
        let balance = self.tokens.entry((token, holder)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Set `spender`'s allowance over `holder`'s tokens.
    pub fn approve(&mut self, token: TokenAddress, holder: AccountId, spender: AccountId, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(token, holder, spender));
        } else {
            self.allowances.insert((token, holder, spender), amount);
        }
    }

    /// Raise `spender`'s allowance over `holder`'s tokens.
    pub fn increase_allowance(
        &mut self,
        token: TokenAddress,
        holder: AccountId,
        spender: AccountId,
        amount: Amount,
    ) {
        let current = self.allowance(&token, &holder, &spender);
        self.approve(token, holder, spender, current.saturating_add(amount));
    }

    /// Current allowance.
    pub fn allowance(&self, token: &TokenAddress, holder: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(*token, *holder, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Make `account` refuse (or accept again) incoming native transfers.
    pub fn set_rejects_native(&mut self, account: AccountId, rejects: bool) {
        if rejects {
            self.rejects_native.insert(account);
        } else {
            self.rejects_native.remove(&account);
        }
    }

    /// Balance of any asset.
    pub fn balance(&self, asset: &Asset, holder: &AccountId) -> Amount {
        match asset {
            Asset::Native => self.native_balance(holder),
            Asset::Token(token) => self.balance_of(token, holder),
        }
    }

    fn move_tokens(
        &mut self,
        token: &TokenAddress,
        holder: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        let available = self.balance_of(token, holder);
        if available < amount {
            return Err(CustodyError::InsufficientBalance {
                holder: *holder,
                asset: Asset::Token(*token),
                needed: amount,
                available,
            });
        }
        if holder == recipient {
            return Ok(());
        }
        let credited = self
            .balance_of(token, recipient)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { recipient: *recipient })?;

        self.tokens.insert((*token, *holder), available - amount);
        self.tokens.insert((*token, *recipient), credited);
        Ok(())
    }
}

impl NativeLedger for InMemoryBank {
    fn transfer_native(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        if self.rejects_native.contains(to) {
            return Err(CustodyError::Rejected { recipient: *to });
        }
        let available = self.native_balance(from);
        if available < amount {
            return Err(CustodyError::InsufficientBalance {
                holder: *from,
                asset: Asset::Native,
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow { recipient: *to })?;

        self.native.insert(*from, available - amount);
        self.native.insert(*to, credited);
        Ok(())
    }

    fn native_balance(&self, holder: &AccountId) -> Amount {
        self.native.get(holder).copied().unwrap_or(0)
    }
}

impl TokenLedger for InMemoryBank {
    fn transfer_from(
        &mut self,
        token: &TokenAddress,
        spender: &AccountId,
        holder: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        let allowed = self.allowance(token, holder, spender);
        if allowed < amount {
            return Err(CustodyError::InsufficientAllowance {
                token: *token,
                holder: *holder,
                spender: *spender,
                needed: amount,
                allowed,
            });
        }
        self.move_tokens(token, holder, recipient, amount)?;
        self.approve(*token, *holder, *spender, allowed - amount);
        Ok(())
    }

    fn transfer(
        &mut self,
        token: &TokenAddress,
        holder: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        self.move_tokens(token, holder, recipient, amount)
    }

    fn balance_of(&self, token: &TokenAddress, holder: &AccountId) -> Amount {
        self.tokens.get(&(*token, *holder)).copied().unwrap_or(0)
    }
}
