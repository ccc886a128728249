//! House vault accounting and the authority's fund/withdraw operations
//!
//! The tracked house balance (`house:balance`) is the portion of the
//! custody account that belongs to the house: retained fees plus lost
//! stakes, minus withdrawals. Funding adds liquidity to custody without
//! touching the tracked balance.

use crate::{
    common::traits::{EntropySource, Ledger},
    common::types::{AccountId, Amount},
    engine::{ledger_rejection, AppliedTransfer, DiceEngine},
    errors::{DiceResult, GameError},
    game_store::decode_u64,
    storage::{KVStore, WriteBatch},
};

const HOUSE_BALANCE_KEY: &[u8] = b"house:balance";

pub fn load_house_balance<S: KVStore + ?Sized>(storage: &S) -> DiceResult<Amount> {
    match storage.get(HOUSE_BALANCE_KEY)? {
        Some(bytes) => decode_u64(&bytes, "house balance"),
        None => Ok(0),
    }
}

pub fn stage_house_balance(batch: &mut WriteBatch, value: Amount) {
    batch.put(HOUSE_BALANCE_KEY, value.to_le_bytes().to_vec());
}

impl<S, L, E> DiceEngine<S, L, E>
where
    S: KVStore + 'static,
    L: Ledger + 'static,
    E: EntropySource + 'static,
{
    /// Move `amount` of accumulated house funds from custody to the authority
    pub fn withdraw(&self, caller: &AccountId, amount: Amount) -> DiceResult<()> {
        let result = self.withdraw_house_funds(caller, amount);
        if let Err(e) = &result {
            self.note_rejection("withdraw", e);
        }
        result
    }

    /// Move `amount` from the authority into custody as payout liquidity
    pub fn fund(&self, caller: &AccountId, amount: Amount) -> DiceResult<()> {
        let result = self.fund_custody(caller, amount);
        if let Err(e) = &result {
            self.note_rejection("fund", e);
        }
        result
    }

    fn withdraw_house_funds(&self, caller: &AccountId, amount: Amount) -> DiceResult<()> {
        self.ensure_authority(caller)?;
        let _guard = self.lock_writes();

        let balance = load_house_balance(&*self.storage)?;
        if amount > balance {
            return Err(GameError::InsufficientBalance {
                needed: amount,
                available: balance,
            }
            .into());
        }

        let mut batch = WriteBatch::new();
        stage_house_balance(&mut batch, balance - amount);

        let custody = self.accounts.custody;
        self.ledger
            .transfer(amount, &custody, caller)
            .map_err(ledger_rejection)?;
        self.commit(
            batch,
            Some(AppliedTransfer {
                amount,
                from: custody,
                to: *caller,
            }),
        )?;

        tracing::info!(amount, remaining = balance - amount, "House funds withdrawn");
        Ok(())
    }

    fn fund_custody(&self, caller: &AccountId, amount: Amount) -> DiceResult<()> {
        self.ensure_authority(caller)?;
        let _guard = self.lock_writes();

        self.ledger
            .transfer(amount, caller, &self.accounts.custody)
            .map_err(ledger_rejection)?;

        tracing::info!(
            amount,
            custody_balance = self.ledger.balance_of(&self.accounts.custody),
            "Custody funded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_house_balance_defaults_to_zero() {
        let storage = MemoryStorage::new();
        assert_eq!(load_house_balance(&storage).unwrap(), 0);

        let mut batch = WriteBatch::new();
        stage_house_balance(&mut batch, 180_000);
        storage.write(batch).unwrap();
        assert_eq!(load_house_balance(&storage).unwrap(), 180_000);
    }
}
