//! In-process value-transfer ledger
//!
//! Stands in for the external settlement ledger in tests, simulations and the
//! CLI. Transfers are applied under a single write lock so a failed transfer
//! never leaves a half-applied debit.

use crate::common::traits::Ledger;
use crate::common::types::{AccountId, Amount};
use crate::errors::LedgerError;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<AccountId, Amount>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` out of thin air
    pub fn mint(&self, account: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let mut balances = self
            .balances
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))?;
        let balance = balances.entry(*account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(*account))?;
        Ok(())
    }

    /// Sum of every balance held in the ledger
    pub fn total_supply(&self) -> u128 {
        self.balances
            .read()
            .map(|balances| balances.values().map(|v| *v as u128).sum())
            .unwrap_or(0)
    }
}

impl Ledger for InMemoryLedger {
    fn transfer(&self, amount: Amount, from: &AccountId, to: &AccountId) -> Result<(), LedgerError> {
        let mut balances = self
            .balances
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))?;

        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: *from,
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = balances
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(*to))?;

        balances.insert(*from, available - amount);
        balances.insert(*to, credited);
        Ok(())
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances
            .read()
            .map(|balances| balances.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}
