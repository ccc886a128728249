//! Collaborator interfaces consumed by the engine
//!
//! The value-transfer ledger and the entropy source are external services;
//! the engine only relies on the contracts spelled out here.

use crate::common::types::{AccountId, Amount};
use crate::errors::LedgerError;

/// Atomic, balance-checked value transfer between accounts.
pub trait Ledger: Send + Sync {
    /// Move `amount` from `from` to `to`.
    ///
    /// Must either apply fully or fail without touching either balance.
    /// Fails with [`LedgerError::InsufficientFunds`] when `from` cannot cover it.
    fn transfer(&self, amount: Amount, from: &AccountId, to: &AccountId) -> Result<(), LedgerError>;

    /// Current balance of `account` (zero for unknown accounts)
    fn balance_of(&self, account: &AccountId) -> Amount;
}

/// Block-associated entropy: a height counter plus a public hash function.
pub trait EntropySource: Send + Sync {
    /// Current chain height, non-decreasing between calls
    fn current_height(&self) -> u64;

    /// Deterministic, publicly computable digest
    fn hash(&self, bytes: &[u8]) -> [u8; 32];
}

impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    fn transfer(&self, amount: Amount, from: &AccountId, to: &AccountId) -> Result<(), LedgerError> {
        (**self).transfer(amount, from, to)
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        (**self).balance_of(account)
    }
}

impl<T: EntropySource + ?Sized> EntropySource for std::sync::Arc<T> {
    fn current_height(&self) -> u64 {
        (**self).current_height()
    }

    fn hash(&self, bytes: &[u8]) -> [u8; 32] {
        (**self).hash(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedEntropy;

    impl EntropySource for FixedEntropy {
        fn current_height(&self) -> u64 {
            42
        }

        fn hash(&self, bytes: &[u8]) -> [u8; 32] {
            let mut out = [0u8; 32];
            out[0] = bytes.len() as u8;
            out
        }
    }

    #[test]
    fn test_arc_forwards_entropy() {
        let shared: Arc<FixedEntropy> = Arc::new(FixedEntropy);
        assert_eq!(shared.current_height(), 42);
        assert_eq!(shared.hash(b"abc")[0], 3);
    }
}
