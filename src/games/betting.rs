//! Bet admission
//!
//! A bet is admitted in one step: the stake moves from the player to the
//! custody account and a pending game record is written. Nothing is rolled
//! here; the outcome is derived later by `resolve_game`.

use crate::{
    common::traits::{EntropySource, Ledger},
    common::types::{AccountId, Amount, GameId},
    engine::{ledger_rejection, AppliedTransfer, DiceEngine},
    errors::{DiceError, DiceResult, GameError},
    game_store,
    games::events::{BetPlaced, GameEvent},
    games::types::{DieFace, Game},
    stats_store,
    storage::{KVStore, WriteBatch},
};

impl<S, L, E> DiceEngine<S, L, E>
where
    S: KVStore + 'static,
    L: Ledger + 'static,
    E: EntropySource + 'static,
{
    /// Admit a wager of `stake` on `prediction` and return the new game id
    pub fn place_bet(&self, caller: &AccountId, prediction: u8, stake: Amount) -> DiceResult<GameId> {
        let result = self.admit_bet(caller, prediction, stake);
        if let Err(e) = &result {
            self.note_rejection("place_bet", e);
        }
        result
    }

    fn validate_stake(&self, stake: Amount) -> Result<(), GameError> {
        if stake < self.game.min_bet || stake > self.game.max_bet {
            return Err(GameError::InvalidBetAmount {
                amount: stake,
                min: self.game.min_bet,
                max: self.game.max_bet,
            });
        }
        Ok(())
    }

    fn admit_bet(&self, caller: &AccountId, prediction: u8, stake: Amount) -> DiceResult<GameId> {
        let prediction = DieFace::new(prediction)?;
        self.validate_stake(stake)?;
        // Escrow from custody to itself moves nothing
        if caller == &self.accounts.custody {
            return Err(GameError::CustodyAccount.into());
        }

        let _guard = self.lock_writes();

        let available = self.ledger.balance_of(caller);
        if available < stake {
            return Err(GameError::InsufficientBalance {
                needed: stake,
                available,
            }
            .into());
        }

        let game_id = game_store::load_game_counter(&*self.storage)?
            .checked_add(1)
            .ok_or(DiceError::Overflow("game counter"))?;
        let height = self.entropy.current_height();
        let game = Game::new(game_id, *caller, stake, prediction, height);

        let mut stats = stats_store::load_player_stats(&*self.storage, caller)?.unwrap_or_default();
        stats.record_bet(stake)?;

        let mut batch = WriteBatch::new();
        game_store::stage_new_game(&mut batch, &game)?;
        game_store::stage_game_counter(&mut batch, game_id);
        stats_store::stage_player_stats(&mut batch, caller, &stats)?;

        let custody = self.accounts.custody;
        self.ledger
            .transfer(stake, caller, &custody)
            .map_err(ledger_rejection)?;
        self.commit(
            batch,
            Some(AppliedTransfer {
                amount: stake,
                from: *caller,
                to: custody,
            }),
        )?;

        self.metrics.record_bet(stake);
        tracing::info!(
            game_id,
            player = %caller,
            prediction = prediction.value(),
            stake,
            height,
            "Bet placed"
        );
        self.events.emit(GameEvent::BetPlaced(BetPlaced {
            game_id,
            player: *caller,
            prediction,
            stake,
            height,
        }));

        Ok(game_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::common::traits::Ledger;
    use crate::common::types::AccountId;
    use crate::config::DiceConfig;
    use crate::engine::DiceEngine;
    use crate::entropy::ChainEntropy;
    use crate::errors::{DiceError, GameError};
    use crate::ledger::InMemoryLedger;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn setup() -> (DiceEngine<MemoryStorage, InMemoryLedger, ChainEntropy>, AccountId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let player = AccountId::from_label("player");
        ledger.mint(&player, 50_000_000).unwrap();

        let engine = DiceEngine::new(
            &DiceConfig::default(),
            Arc::new(MemoryStorage::new()),
            ledger,
            Arc::new(ChainEntropy::new(100)),
        )
        .unwrap();
        (engine, player)
    }

    #[test]
    fn test_bet_moves_stake_into_custody() {
        let (engine, player) = setup();

        let id = engine.place_bet(&player, 4, 2_000_000).unwrap();
        assert_eq!(id, 1);

        let game = engine.get_game(id).unwrap().unwrap();
        assert_eq!(game.stake, 2_000_000);
        assert_eq!(game.prediction.value(), 4);
        assert_eq!(game.admission_height, 100);
        assert!(!game.resolved);

        assert_eq!(engine.ledger().balance_of(&player), 48_000_000);
        assert_eq!(engine.ledger().balance_of(engine.custody()), 2_000_000);
        assert_eq!(engine.metrics().snapshot().bets_placed, 1);
    }

    #[test]
    fn test_prediction_checked_before_stake() {
        let (engine, player) = setup();

        let err = engine.place_bet(&player, 7, 1).unwrap_err();
        assert_eq!(err.game_error(), Some(&GameError::InvalidPrediction(7)));
        assert_eq!(engine.get_game_counter().unwrap(), 0);
        assert_eq!(engine.metrics().snapshot().rejected, 1);
    }

    #[test]
    fn test_stake_bounds_are_inclusive() {
        let (engine, player) = setup();

        assert!(engine.place_bet(&player, 1, 1_000_000).is_ok());
        assert!(matches!(
            engine.place_bet(&player, 1, 999_999),
            Err(DiceError::Game(GameError::InvalidBetAmount { amount: 999_999, .. }))
        ));
        assert!(matches!(
            engine.place_bet(&player, 1, 100_000_001),
            Err(DiceError::Game(GameError::InvalidBetAmount { .. }))
        ));
        assert_eq!(engine.get_game_counter().unwrap(), 1);
    }

    #[test]
    fn test_custody_cannot_bet_against_itself() {
        let (engine, _) = setup();
        let custody = *engine.custody();
        engine.ledger().mint(&custody, 100_000_000).unwrap();

        let err = engine.place_bet(&custody, 3, 10_000_000).unwrap_err();
        assert_eq!(err.game_error(), Some(&GameError::CustodyAccount));
        assert_eq!(engine.get_game_counter().unwrap(), 0);
        assert_eq!(engine.get_player_stats(&custody).unwrap(), None);
        assert_eq!(engine.ledger().balance_of(&custody), 100_000_000);
    }
}
