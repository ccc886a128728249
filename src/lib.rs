//! Dicehouse - Deterministic Dice Wager Settlement
//!
//! Players stake a fungible asset on a prediction of a six-sided die. The
//! stake moves into a custody account at admission; a later resolution
//! derives the outcome from chain entropy and pays `stake * 6` less the
//! house edge on a hit, or keeps the stake for the house on a miss.
//!
//! The engine is generic over its collaborators: a [`KVStore`] for state,
//! a [`Ledger`] for balances and an [`EntropySource`] for the chain height
//! and hash. [`OptimizedStorage`] (RocksDB), [`InMemoryLedger`] and
//! [`ChainEntropy`] are the stock implementations.

pub mod common;
pub mod errors;
pub mod config;
pub mod storage;
pub mod ledger;
pub mod entropy;
pub mod game_store;
pub mod stats_store;
pub mod house;
pub mod games;
pub mod engine;
pub mod metrics;

use common::types::Amount;

/// Smallest accepted stake, in base units
pub const MIN_BET: Amount = 1_000_000;
/// Largest accepted stake, in base units
pub const MAX_BET: Amount = 100_000_000;
/// House edge on winning payouts, in basis points (3%)
pub const HOUSE_EDGE_BPS: u64 = 300;
pub const BPS_DENOMINATOR: u64 = 10_000;
pub const DICE_FACES: u8 = 6;

pub use common::traits::{EntropySource, Ledger};
pub use common::types::{AccountId, GameId};
pub use config::{ConfigBuilder, ConfigLoader, DiceConfig, RandomnessMode};
pub use engine::DiceEngine;
pub use entropy::ChainEntropy;
pub use errors::{DiceError, DiceResult, GameError};
pub use games::{DieFace, Game, GameEvent, GameInfo, PlayerStatistics, ResolutionReceipt};
pub use ledger::InMemoryLedger;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use storage::{KVStore, MemoryStorage, OptimizedStorage, WriteBatch};
