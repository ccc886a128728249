//! The settlement engine handle
//!
//! [`DiceEngine`] owns every collaborator an operation needs: the store, the
//! ledger, the entropy source and the randomness source. Mutating operations
//! live next to their component (`games::betting`, `games::resolution`,
//! `house`); this module holds construction, the transaction helpers and
//! the read-only query service.
//!
//! Each mutating operation runs under `write_lock`, validates everything,
//! stages its writes in one [`WriteBatch`], moves funds, then commits.

use crate::{
    common::traits::{EntropySource, Ledger},
    common::types::{AccountId, Amount, GameId},
    config::{AccountsConfig, ConfigLoader, DiceConfig, GameConfig},
    errors::{DiceError, DiceResult, GameError, LedgerError},
    game_store,
    games::{
        events::{EventBus, GameEvent},
        randomness::{build_randomness, RandomnessSource},
        settlement::compute_settlement,
        types::{Game, GameInfo, PlayerStatistics, RandomnessKind},
    },
    house,
    metrics::EngineMetrics,
    stats_store,
    storage::{KVStore, WriteBatch},
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// A ledger movement already applied inside the current operation
#[derive(Debug, Clone, Copy)]
pub(crate) struct AppliedTransfer {
    pub amount: Amount,
    pub from: AccountId,
    pub to: AccountId,
}

pub struct DiceEngine<S, L, E>
where
    S: KVStore + 'static,
    L: Ledger + 'static,
    E: EntropySource + 'static,
{
    pub(crate) storage: Arc<S>,
    pub(crate) ledger: Arc<L>,
    pub(crate) entropy: Arc<E>,
    pub(crate) randomness: Arc<dyn RandomnessSource>,
    pub(crate) game: GameConfig,
    pub(crate) accounts: AccountsConfig,
    pub(crate) events: EventBus,
    pub(crate) metrics: Arc<EngineMetrics>,
    write_lock: Mutex<()>,
}

impl<S, L, E> DiceEngine<S, L, E>
where
    S: KVStore + 'static,
    L: Ledger + 'static,
    E: EntropySource + 'static,
{
    /// Validate `config` and build an engine with the configured randomness
    pub fn new(config: &DiceConfig, storage: Arc<S>, ledger: Arc<L>, entropy: Arc<E>) -> DiceResult<Self> {
        ConfigLoader::new().validate(config)?;
        let randomness = build_randomness(config.randomness.mode, &*storage)?;
        Ok(Self::with_randomness(config, storage, ledger, entropy, randomness))
    }

    /// Build an engine around an explicit randomness source
    pub fn with_randomness(
        config: &DiceConfig,
        storage: Arc<S>,
        ledger: Arc<L>,
        entropy: Arc<E>,
        randomness: Arc<dyn RandomnessSource>,
    ) -> Self {
        tracing::info!(
            authority = %config.accounts.authority,
            custody = %config.accounts.custody,
            min_bet = config.game.min_bet,
            max_bet = config.game.max_bet,
            house_edge_bps = config.game.house_edge_bps,
            randomness = %randomness.kind(),
            "Dice engine initialised"
        );

        Self {
            storage,
            ledger,
            entropy,
            randomness,
            game: config.game.clone(),
            accounts: config.accounts.clone(),
            events: EventBus::default(),
            metrics: Arc::new(EngineMetrics::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn authority(&self) -> &AccountId {
        &self.accounts.authority
    }

    pub fn custody(&self) -> &AccountId {
        &self.accounts.custody
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn entropy(&self) -> &Arc<E> {
        &self.entropy
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn randomness_kind(&self) -> RandomnessKind {
        self.randomness.kind()
    }

    /// Receive `bet-placed` and `game-resolved` events committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Transaction helpers
    // ------------------------------------------------------------------

    /// Serialise writers. The guarded value is `()`, so a poisoned lock
    /// carries no broken state and is simply taken over.
    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn ensure_authority(&self, caller: &AccountId) -> DiceResult<()> {
        if caller != &self.accounts.authority {
            return Err(GameError::OwnerOnly.into());
        }
        Ok(())
    }

    /// Commit staged writes; if that fails, undo the transfer already made
    pub(crate) fn commit(&self, batch: WriteBatch, applied: Option<AppliedTransfer>) -> DiceResult<()> {
        let ops = batch.len();
        let Err(e) = self.storage.write(batch) else {
            tracing::debug!(ops, "Committed write batch");
            return Ok(());
        };

        if let Some(transfer) = applied {
            match self.ledger.transfer(transfer.amount, &transfer.to, &transfer.from) {
                Ok(()) => tracing::warn!(
                    amount = transfer.amount,
                    from = %transfer.to,
                    to = %transfer.from,
                    "Commit failed; transfer reversed"
                ),
                Err(rollback) => tracing::error!(
                    amount = transfer.amount,
                    error = %rollback,
                    "Commit failed and transfer could not be reversed"
                ),
            }
        }
        Err(e)
    }

    /// Count and log a rejected operation
    pub(crate) fn note_rejection(&self, operation: &'static str, error: &DiceError) {
        self.metrics.record_rejection();
        match error {
            DiceError::Game(reason) => tracing::warn!(operation, %reason, "Operation rejected"),
            other => tracing::error!(operation, error = %other, "Operation failed"),
        }
    }

    // ------------------------------------------------------------------
    // Query service
    // ------------------------------------------------------------------

    pub fn get_game(&self, game_id: GameId) -> DiceResult<Option<Game>> {
        game_store::load_game(&*self.storage, game_id)
    }

    pub fn get_player_stats(&self, account: &AccountId) -> DiceResult<Option<PlayerStatistics>> {
        stats_store::load_player_stats(&*self.storage, account)
    }

    pub fn get_game_counter(&self) -> DiceResult<u64> {
        game_store::load_game_counter(&*self.storage)
    }

    pub fn get_house_balance(&self) -> DiceResult<Amount> {
        house::load_house_balance(&*self.storage)
    }

    /// Limits plus counters read together under the writer lock, so the
    /// result reflects one committed state
    pub fn get_game_info(&self) -> DiceResult<GameInfo> {
        let _guard = self.lock_writes();
        Ok(GameInfo {
            min_bet: self.game.min_bet,
            max_bet: self.game.max_bet,
            house_edge_bps: self.game.house_edge_bps,
            payout_multiplier: self.game.payout_multiplier,
            game_counter: self.get_game_counter()?,
            house_balance: self.get_house_balance()?,
            custody_balance: self.ledger.balance_of(&self.accounts.custody),
            randomness: self.randomness.kind(),
        })
    }

    pub fn list_games(&self, cursor: Option<&str>, limit: usize) -> DiceResult<(Vec<Game>, Option<String>)> {
        game_store::load_games(&*self.storage, cursor, limit)
    }

    pub fn list_pending_games(&self, cursor: Option<&str>, limit: usize) -> DiceResult<(Vec<Game>, Option<String>)> {
        game_store::load_pending_games(&*self.storage, cursor, limit)
    }

    /// Recompute a resolved game's outcome and settlement from its stored
    /// proof. Unresolved games verify as `false`.
    pub fn verify_game(&self, game_id: GameId) -> DiceResult<bool> {
        let game = self.get_game(game_id)?.ok_or(GameError::GameNotFound(game_id))?;

        let (Some(outcome), Some(height), Some(proof)) =
            (game.outcome, game.resolution_height, game.roll_proof.as_ref())
        else {
            return Ok(false);
        };
        if !game.resolved || proof.outcome != outcome {
            return Ok(false);
        }
        if !self.randomness.verify(game_id, height, proof, &*self.entropy)? {
            return Ok(false);
        }

        let settlement = compute_settlement(&self.game, game.stake, game.prediction, outcome)?;
        Ok(settlement.net_payout == game.payout && settlement.house_fee == game.house_fee)
    }
}

/// Map a ledger failure onto the caller-facing rejection
pub(crate) fn ledger_rejection(error: LedgerError) -> DiceError {
    match error {
        LedgerError::InsufficientFunds { needed, available, .. } => {
            GameError::InsufficientBalance { needed, available }.into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::ChainEntropy;
    use crate::ledger::InMemoryLedger;
    use crate::storage::MemoryStorage;

    fn engine() -> DiceEngine<MemoryStorage, InMemoryLedger, ChainEntropy> {
        DiceEngine::new(
            &DiceConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(InMemoryLedger::new()),
            Arc::new(ChainEntropy::new(1)),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_engine_queries() {
        let engine = engine();

        assert_eq!(engine.get_game(1).unwrap(), None);
        assert_eq!(engine.get_player_stats(&AccountId::new([1; 32])).unwrap(), None);
        assert_eq!(engine.get_game_counter().unwrap(), 0);
        assert_eq!(engine.get_house_balance().unwrap(), 0);

        let info = engine.get_game_info().unwrap();
        assert_eq!(info.min_bet, 1_000_000);
        assert_eq!(info.max_bet, 100_000_000);
        assert_eq!(info.house_edge_bps, 300);
        assert_eq!(info.randomness, RandomnessKind::Public);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = DiceConfig::default();
        config.game.min_bet = 0;

        let result = DiceEngine::new(
            &config,
            Arc::new(MemoryStorage::new()),
            Arc::new(InMemoryLedger::new()),
            Arc::new(ChainEntropy::default()),
        );
        assert!(matches!(result, Err(DiceError::Configuration(_))));
    }

    #[test]
    fn test_ledger_shortfall_maps_to_insufficient_balance() {
        let err = ledger_rejection(LedgerError::InsufficientFunds {
            account: AccountId::default(),
            needed: 10,
            available: 3,
        });
        assert_eq!(
            err.game_error(),
            Some(&GameError::InsufficientBalance { needed: 10, available: 3 })
        );

        let err = ledger_rejection(LedgerError::Unavailable("down".to_string()));
        assert!(matches!(err, DiceError::Ledger(_)));
    }

    #[test]
    fn test_verify_unknown_game() {
        let engine = engine();
        assert!(matches!(
            engine.verify_game(99),
            Err(DiceError::Game(GameError::GameNotFound(99)))
        ));
    }
}
