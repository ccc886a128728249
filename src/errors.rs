//! Error types for the dicehouse settlement engine
//!
//! Domain rejections live in [`GameError`]; infrastructure failures are kept
//! in their own enums and rolled up into [`DiceError`].

use crate::common::types::AccountId;
use thiserror::Error;

/// Root error type for all dicehouse operations
#[derive(Debug, Error)]
pub enum DiceError {
    /// Bet admission, resolution or house accounting rejected the request
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Persistence layer errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Value-transfer ledger errors that are not a plain balance shortfall
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Outcome derivation or proof verification errors
    #[error("Randomness error: {0}")]
    Randomness(#[from] RandomnessError),

    /// A counter would wrap around
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Rejections a caller can receive from the public operations.
///
/// Every one of these is raised before any state mutation or fund movement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Only the house authority may perform this operation")]
    OwnerOnly,

    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    #[error("Bet amount {amount} outside allowed range [{min}, {max}]")]
    InvalidBetAmount { amount: u64, min: u64, max: u64 },

    #[error("Game {0} not found or already resolved")]
    GameNotFound(u64),

    #[error("Prediction {0} is not a die face (1-6)")]
    InvalidPrediction(u8),

    #[error("The custody account cannot place bets")]
    CustodyAccount,
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Errors reported by a [`Ledger`](crate::common::traits::Ledger) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Account {account} holds {available}, transfer needs {needed}")]
    InsufficientFunds {
        account: AccountId,
        needed: u64,
        available: u64,
    },

    #[error("Balance of {0} would overflow")]
    BalanceOverflow(AccountId),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Outcome derivation errors
#[derive(Debug, Error)]
pub enum RandomnessError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Proof was produced by '{found}', active source is '{expected}'")]
    SourceMismatch { expected: String, found: String },
}

impl From<rocksdb::Error> for DiceError {
    fn from(e: rocksdb::Error) -> Self {
        DiceError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<std::io::Error> for DiceError {
    fn from(e: std::io::Error) -> Self {
        DiceError::Storage(StorageError::ReadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for DiceError {
    fn from(e: serde_json::Error) -> Self {
        DiceError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

impl DiceError {
    /// The domain rejection carried by this error, if any
    pub fn game_error(&self) -> Option<&GameError> {
        match self {
            DiceError::Game(e) => Some(e),
            _ => None,
        }
    }
}

// Convenience type alias for Results
pub type DiceResult<T> = Result<T, DiceError>;
