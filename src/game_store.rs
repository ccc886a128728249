//! Persistent game records and the game counter.
//!
//! Key layout:
//! - `game:record:<id be>` -> JSON [`Game`]
//! - `game:index:pending:<id be>` -> empty marker while the game is unresolved
//! - `game:counter` -> little-endian u64, last id handed out

use crate::{
    common::types::GameId,
    errors::{DiceError, DiceResult, StorageError},
    games::types::Game,
    storage::{KVStore, WriteBatch},
};

const GAME_RECORD_PREFIX: &[u8] = b"game:record:";
const PENDING_INDEX_PREFIX: &[u8] = b"game:index:pending:";
const GAME_COUNTER_KEY: &[u8] = b"game:counter";

fn prefixed_id_key(prefix: &[u8], id: GameId) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn game_record_key(id: GameId) -> Vec<u8> {
    prefixed_id_key(GAME_RECORD_PREFIX, id)
}

fn pending_index_key(id: GameId) -> Vec<u8> {
    prefixed_id_key(PENDING_INDEX_PREFIX, id)
}

fn id_from_key(prefix: &[u8], key: &[u8]) -> Option<GameId> {
    if !key.starts_with(prefix) || key.len() != prefix.len() + 8 {
        return None;
    }
    let bytes: [u8; 8] = key[prefix.len()..].try_into().ok()?;
    Some(GameId::from_be_bytes(bytes))
}

pub(crate) fn decode_u64(bytes: &[u8], what: &str) -> DiceResult<u64> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        DiceError::Storage(StorageError::CorruptedData(format!(
            "{} must be 8 bytes, found {}",
            what,
            bytes.len()
        )))
    })?;
    Ok(u64::from_le_bytes(array))
}

fn decode_cursor(cursor_hex: Option<&str>) -> DiceResult<Option<Vec<u8>>> {
    cursor_hex
        .map(|c| {
            hex::decode(c).map_err(|e| {
                DiceError::Storage(StorageError::CorruptedData(format!("Invalid cursor hex: {}", e)))
            })
        })
        .transpose()
}

fn encode_game(game: &Game) -> DiceResult<Vec<u8>> {
    serde_json::to_vec(game).map_err(|e| {
        DiceError::Storage(StorageError::WriteFailed(format!(
            "Failed to encode game {}: {}",
            game.id, e
        )))
    })
}

pub fn load_game<S: KVStore + ?Sized>(storage: &S, id: GameId) -> DiceResult<Option<Game>> {
    let Some(bytes) = storage.get(&game_record_key(id))? else {
        return Ok(None);
    };

    let game: Game = serde_json::from_slice(&bytes).map_err(|e| {
        DiceError::Storage(StorageError::CorruptedData(format!(
            "Failed to decode game {}: {}",
            id, e
        )))
    })?;

    Ok(Some(game))
}

/// Stage a freshly admitted game and its pending-index marker
pub fn stage_new_game(batch: &mut WriteBatch, game: &Game) -> DiceResult<()> {
    batch.put(game_record_key(game.id), encode_game(game)?);
    batch.put(pending_index_key(game.id), Vec::new());
    Ok(())
}

/// Stage the final form of a resolved game and drop it from the pending index
pub fn stage_resolved_game(batch: &mut WriteBatch, game: &Game) -> DiceResult<()> {
    batch.put(game_record_key(game.id), encode_game(game)?);
    batch.delete(pending_index_key(game.id));
    tracing::debug!(game_id = game.id, "Staged resolved game record");
    Ok(())
}

pub fn load_game_counter<S: KVStore + ?Sized>(storage: &S) -> DiceResult<u64> {
    match storage.get(GAME_COUNTER_KEY)? {
        Some(bytes) => decode_u64(&bytes, "game counter"),
        None => Ok(0),
    }
}

pub fn stage_game_counter(batch: &mut WriteBatch, value: u64) {
    batch.put(GAME_COUNTER_KEY, value.to_le_bytes().to_vec());
}

/// Page through all games in id order.
///
/// Returns the games and a hex cursor to pass back for the next page, or
/// `None` once the end is reached.
pub fn load_games<S: KVStore + ?Sized>(
    storage: &S,
    cursor_hex: Option<&str>,
    limit: usize,
) -> DiceResult<(Vec<Game>, Option<String>)> {
    let cursor = decode_cursor(cursor_hex)?;
    let limit = limit.max(1);
    let rows = storage.scan_prefix(GAME_RECORD_PREFIX, cursor.as_deref(), limit)?;

    let mut games = Vec::with_capacity(rows.len());
    let mut last_key = None;
    for (key, value) in rows {
        let game: Game = serde_json::from_slice(&value).map_err(|e| {
            DiceError::Storage(StorageError::CorruptedData(format!(
                "Failed to decode game at key {}: {}",
                hex::encode(&key),
                e
            )))
        })?;
        games.push(game);
        last_key = Some(key);
    }

    let next_cursor = if games.len() >= limit {
        last_key.map(hex::encode)
    } else {
        None
    };
    Ok((games, next_cursor))
}

/// Page through unresolved games using the pending index
pub fn load_pending_games<S: KVStore + ?Sized>(
    storage: &S,
    cursor_hex: Option<&str>,
    limit: usize,
) -> DiceResult<(Vec<Game>, Option<String>)> {
    let cursor = decode_cursor(cursor_hex)?;
    let limit = limit.max(1);
    let rows = storage.scan_prefix(PENDING_INDEX_PREFIX, cursor.as_deref(), limit)?;
    let row_count = rows.len();

    let mut games = Vec::with_capacity(row_count);
    let mut last_key = None;
    for (key, _) in rows {
        match id_from_key(PENDING_INDEX_PREFIX, &key) {
            Some(id) => match load_game(storage, id)? {
                Some(game) if !game.resolved => games.push(game),
                Some(_) => tracing::warn!(game_id = id, "Pending index points at a resolved game"),
                None => tracing::warn!(game_id = id, "Pending index points at a missing game"),
            },
            None => tracing::warn!(key = %hex::encode(&key), "Malformed pending index key"),
        }
        last_key = Some(key);
    }

    let next_cursor = if row_count >= limit {
        last_key.map(hex::encode)
    } else {
        None
    };
    Ok((games, next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::AccountId;
    use crate::games::types::DieFace;
    use crate::storage::MemoryStorage;

    fn game(id: GameId) -> Game {
        Game::new(id, AccountId::new([1u8; 32]), 1_000_000, DieFace::new(2).unwrap(), 10)
    }

    fn insert(storage: &MemoryStorage, games: &[Game]) {
        let mut batch = WriteBatch::new();
        for g in games {
            stage_new_game(&mut batch, g).unwrap();
        }
        storage.write(batch).unwrap();
    }

    #[test]
    fn test_store_and_load_game() {
        let storage = MemoryStorage::new();
        insert(&storage, &[game(1)]);

        assert_eq!(load_game(&storage, 1).unwrap(), Some(game(1)));
        assert_eq!(load_game(&storage, 2).unwrap(), None);
    }

    #[test]
    fn test_counter_defaults_to_zero() {
        let storage = MemoryStorage::new();
        assert_eq!(load_game_counter(&storage).unwrap(), 0);

        let mut batch = WriteBatch::new();
        stage_game_counter(&mut batch, 41);
        storage.write(batch).unwrap();
        assert_eq!(load_game_counter(&storage).unwrap(), 41);
    }

    #[test]
    fn test_corrupted_counter_is_reported() {
        let storage = MemoryStorage::new();
        storage.put(GAME_COUNTER_KEY, b"bad").unwrap();
        assert!(matches!(
            load_game_counter(&storage),
            Err(DiceError::Storage(StorageError::CorruptedData(_)))
        ));
    }

    #[test]
    fn test_resolution_clears_pending_index() {
        let storage = MemoryStorage::new();
        insert(&storage, &[game(1), game(2), game(3)]);

        let mut resolved = game(2);
        resolved.resolved = true;
        resolved.outcome = Some(DieFace::new(4).unwrap());
        let mut batch = WriteBatch::new();
        stage_resolved_game(&mut batch, &resolved).unwrap();
        storage.write(batch).unwrap();

        let (pending, cursor) = load_pending_games(&storage, None, 10).unwrap();
        let ids: Vec<_> = pending.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(cursor.is_none());
    }

    #[test]
    fn test_paging_through_games() {
        let storage = MemoryStorage::new();
        insert(&storage, &(1..=5).map(game).collect::<Vec<_>>());

        let (page1, cursor) = load_games(&storage, None, 2).unwrap();
        assert_eq!(page1.iter().map(|g| g.id).collect::<Vec<_>>(), vec![1, 2]);

        let (page2, cursor) = load_games(&storage, cursor.as_deref(), 2).unwrap();
        assert_eq!(page2.iter().map(|g| g.id).collect::<Vec<_>>(), vec![3, 4]);

        let (page3, cursor) = load_games(&storage, cursor.as_deref(), 2).unwrap();
        assert_eq!(page3.iter().map(|g| g.id).collect::<Vec<_>>(), vec![5]);
        assert!(cursor.is_none());
    }

    #[test]
    fn test_ids_sort_numerically() {
        let storage = MemoryStorage::new();
        insert(&storage, &[game(256), game(2), game(10)]);

        let (games, _) = load_games(&storage, None, 10).unwrap();
        assert_eq!(games.iter().map(|g| g.id).collect::<Vec<_>>(), vec![2, 10, 256]);
    }

    #[test]
    fn test_invalid_cursor() {
        let storage = MemoryStorage::new();
        assert!(load_games(&storage, Some("not-hex"), 5).is_err());
    }
}
