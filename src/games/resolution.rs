//! Game resolution
//!
//! Resolution rolls the die for a pending game at the current height,
//! settles it, and records the result. Any caller may resolve any pending
//! game; a game is resolved at most once.

use crate::{
    common::traits::{EntropySource, Ledger},
    common::types::GameId,
    engine::{ledger_rejection, AppliedTransfer, DiceEngine},
    errors::{DiceError, DiceResult, GameError},
    game_store,
    games::events::{GameEvent, GameResolved},
    games::settlement::compute_settlement,
    games::types::ResolutionReceipt,
    house, stats_store,
    storage::{KVStore, WriteBatch},
};

impl<S, L, E> DiceEngine<S, L, E>
where
    S: KVStore + 'static,
    L: Ledger + 'static,
    E: EntropySource + 'static,
{
    /// Roll and settle pending game `game_id`.
    ///
    /// Fails with `GameNotFound` if the id was never issued or the game is
    /// already resolved. A winning payout that custody cannot cover fails
    /// with `InsufficientBalance` and leaves the game pending.
    pub fn resolve_game(&self, game_id: GameId) -> DiceResult<ResolutionReceipt> {
        let result = self.settle_game(game_id);
        if let Err(e) = &result {
            self.note_rejection("resolve_game", e);
        }
        result
    }

    fn settle_game(&self, game_id: GameId) -> DiceResult<ResolutionReceipt> {
        let _guard = self.lock_writes();

        let mut game = match game_store::load_game(&*self.storage, game_id)? {
            Some(game) if !game.resolved => game,
            _ => return Err(GameError::GameNotFound(game_id).into()),
        };

        let height = self.entropy.current_height();
        let proof = self.randomness.roll(game_id, height, &*self.entropy)?;
        let outcome = proof.outcome;
        let settlement = compute_settlement(&self.game, game.stake, game.prediction, outcome)?;

        let house_balance = house::load_house_balance(&*self.storage)?
            .checked_add(settlement.house_credit)
            .ok_or(DiceError::Overflow("house balance"))?;

        let mut stats = stats_store::load_player_stats(&*self.storage, &game.player)?.unwrap_or_default();
        if settlement.win {
            stats.record_win(settlement.net_payout)?;
        } else {
            stats.record_loss(game.stake)?;
        }

        game.outcome = Some(outcome);
        game.payout = settlement.net_payout;
        game.house_fee = settlement.house_fee;
        game.resolution_height = Some(height);
        game.roll_proof = Some(proof);
        game.resolved = true;

        let mut batch = WriteBatch::new();
        game_store::stage_resolved_game(&mut batch, &game)?;
        house::stage_house_balance(&mut batch, house_balance);
        stats_store::stage_player_stats(&mut batch, &game.player, &stats)?;

        let applied = if settlement.net_payout > 0 {
            let custody = self.accounts.custody;
            self.ledger
                .transfer(settlement.net_payout, &custody, &game.player)
                .map_err(ledger_rejection)?;
            Some(AppliedTransfer {
                amount: settlement.net_payout,
                from: custody,
                to: game.player,
            })
        } else {
            None
        };
        self.commit(batch, applied)?;

        self.metrics.record_resolution(settlement.win, settlement.net_payout);
        tracing::info!(
            game_id,
            player = %game.player,
            prediction = game.prediction.value(),
            outcome = outcome.value(),
            win = settlement.win,
            payout = settlement.net_payout,
            fee = settlement.house_fee,
            height,
            "Game resolved"
        );
        self.events.emit(GameEvent::GameResolved(GameResolved {
            game_id,
            player: game.player,
            prediction: game.prediction,
            outcome,
            win: settlement.win,
            payout: settlement.net_payout,
            fee: settlement.house_fee,
        }));

        Ok(ResolutionReceipt {
            game_id,
            outcome,
            win: settlement.win,
            payout: settlement.net_payout,
            house_fee: settlement.house_fee,
        })
    }
}
