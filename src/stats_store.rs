//! Per-player aggregate counters, keyed `player:stats:<account hex>`

use crate::{
    common::types::AccountId,
    errors::{DiceError, DiceResult, StorageError},
    games::types::PlayerStatistics,
    storage::{KVStore, WriteBatch},
};

const PLAYER_STATS_PREFIX: &str = "player:stats:";

fn player_stats_key(account: &AccountId) -> Vec<u8> {
    format!("{}{}", PLAYER_STATS_PREFIX, account.to_hex()).into_bytes()
}

pub fn load_player_stats<S: KVStore + ?Sized>(
    storage: &S,
    account: &AccountId,
) -> DiceResult<Option<PlayerStatistics>> {
    let Some(bytes) = storage.get(&player_stats_key(account))? else {
        return Ok(None);
    };

    let stats = serde_json::from_slice(&bytes).map_err(|e| {
        DiceError::Storage(StorageError::CorruptedData(format!(
            "Failed to decode stats for {}: {}",
            account, e
        )))
    })?;
    Ok(Some(stats))
}

pub fn stage_player_stats(
    batch: &mut WriteBatch,
    account: &AccountId,
    stats: &PlayerStatistics,
) -> DiceResult<()> {
    let bytes = serde_json::to_vec(stats).map_err(|e| {
        DiceError::Storage(StorageError::WriteFailed(format!(
            "Failed to encode stats for {}: {}",
            account, e
        )))
    })?;
    batch.put(player_stats_key(account), bytes);
    Ok(())
}

impl PlayerStatistics {
    /// Count a newly admitted bet
    pub fn record_bet(&mut self, stake: u64) -> DiceResult<()> {
        let games_count = self
            .games_count
            .checked_add(1)
            .ok_or(DiceError::Overflow("games_count"))?;
        let total_staked = self
            .total_staked
            .checked_add(stake)
            .ok_or(DiceError::Overflow("total_staked"))?;
        self.games_count = games_count;
        self.total_staked = total_staked;
        Ok(())
    }

    pub fn record_win(&mut self, net_payout: u64) -> DiceResult<()> {
        self.total_won = self
            .total_won
            .checked_add(net_payout)
            .ok_or(DiceError::Overflow("total_won"))?;
        self.games_won = self.games_won.saturating_add(1);
        Ok(())
    }

    pub fn record_loss(&mut self, stake: u64) -> DiceResult<()> {
        self.total_lost = self
            .total_lost
            .checked_add(stake)
            .ok_or(DiceError::Overflow("total_lost"))?;
        self.games_lost = self.games_lost.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_absent_until_written() {
        let storage = MemoryStorage::new();
        let account = AccountId::new([4u8; 32]);
        assert_eq!(load_player_stats(&storage, &account).unwrap(), None);

        let mut stats = PlayerStatistics::default();
        stats.record_bet(500).unwrap();
        let mut batch = WriteBatch::new();
        stage_player_stats(&mut batch, &account, &stats).unwrap();
        storage.write(batch).unwrap();

        let loaded = load_player_stats(&storage, &account).unwrap().unwrap();
        assert_eq!(loaded.games_count, 1);
        assert_eq!(loaded.total_staked, 500);
    }

    #[test]
    fn test_record_outcomes() {
        let mut stats = PlayerStatistics::default();
        stats.record_bet(100).unwrap();
        stats.record_bet(100).unwrap();
        stats.record_win(582).unwrap();
        stats.record_loss(100).unwrap();

        assert_eq!(stats.games_count, 2);
        assert_eq!(stats.total_staked, 200);
        assert_eq!(stats.total_won, 582);
        assert_eq!(stats.total_lost, 100);
        assert_eq!((stats.games_won, stats.games_lost), (1, 1));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut stats = PlayerStatistics {
            total_staked: u64::MAX,
            ..PlayerStatistics::default()
        };
        assert!(matches!(stats.record_bet(1), Err(DiceError::Overflow("total_staked"))));
    }
}
