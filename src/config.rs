//! Configuration management with validation and defaults
//!
//! Settings are read from TOML, overridden from `DICEHOUSE_*` environment
//! variables, then validated before the engine is built.

use crate::common::types::AccountId;
use crate::errors::{ConfigurationError, DiceResult};
use crate::{BPS_DENOMINATOR, DICE_FACES, HOUSE_EDGE_BPS, MAX_BET, MIN_BET};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiceConfig {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub randomness: RandomnessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Betting limits and payout parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    pub min_bet: u64,
    pub max_bet: u64,
    pub house_edge_bps: u64,
    /// Gross payout multiple on a correct prediction
    pub payout_multiplier: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_bet: MIN_BET,
            max_bet: MAX_BET,
            house_edge_bps: HOUSE_EDGE_BPS,
            payout_multiplier: DICE_FACES as u64,
        }
    }
}

/// Privileged and custodial accounts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountsConfig {
    /// The single principal allowed to withdraw and fund
    pub authority: AccountId,
    /// Account holding escrowed stakes and house liquidity
    pub custody: AccountId,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            authority: AccountId::from_label("dicehouse:authority"),
            custody: AccountId::from_label("dicehouse:custody"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: String,
    pub clear_on_start: bool,
    pub write_buffer_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/dicehouse_data".to_string(),
            clear_on_start: false,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Which outcome derivation backs the resolution engine
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RandomnessMode {
    /// Reproducible derivation from game id, height and a public hash
    #[default]
    Public,
    /// Schnorrkel VRF with a key persisted in storage
    Vrf,
    /// House seed committed up front and revealed for audit
    CommitReveal,
}

impl std::str::FromStr for RandomnessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "vrf" => Ok(Self::Vrf),
            "commit_reveal" | "commit-reveal" => Ok(Self::CommitReveal),
            other => Err(format!("unknown randomness mode '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RandomnessConfig {
    pub mode: RandomnessMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "dicehouse=info".to_string(),
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> DiceResult<DiceConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => DiceConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> DiceResult<DiceConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut DiceConfig) -> DiceResult<()> {
        if let Ok(data_dir) = env::var("DICEHOUSE_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }
        if let Ok(filter) = env::var("DICEHOUSE_LOG") {
            config.logging.filter = filter;
        }
        if let Ok(value) = env::var("DICEHOUSE_MIN_BET") {
            config.game.min_bet = parse_env("DICEHOUSE_MIN_BET", value)?;
        }
        if let Ok(value) = env::var("DICEHOUSE_MAX_BET") {
            config.game.max_bet = parse_env("DICEHOUSE_MAX_BET", value)?;
        }
        if let Ok(value) = env::var("DICEHOUSE_AUTHORITY") {
            config.accounts.authority = parse_env("DICEHOUSE_AUTHORITY", value)?;
        }
        if let Ok(value) = env::var("DICEHOUSE_RANDOMNESS") {
            config.randomness.mode = parse_env("DICEHOUSE_RANDOMNESS", value)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &DiceConfig) -> DiceResult<()> {
        let game = &config.game;

        if game.min_bet == 0 {
            return Err(invalid("game.min_bet", "0", "Minimum bet must be positive"));
        }
        if game.min_bet > game.max_bet {
            return Err(invalid(
                "game.max_bet",
                &game.max_bet.to_string(),
                "Maximum bet must not be below the minimum bet",
            ));
        }
        if game.house_edge_bps >= BPS_DENOMINATOR {
            return Err(invalid(
                "game.house_edge_bps",
                &game.house_edge_bps.to_string(),
                "House edge must be below 10000 basis points",
            ));
        }
        if game.payout_multiplier < 2 {
            return Err(invalid(
                "game.payout_multiplier",
                &game.payout_multiplier.to_string(),
                "Payout multiplier must be at least 2",
            ));
        }
        if game.max_bet.checked_mul(game.payout_multiplier).is_none() {
            return Err(invalid(
                "game.max_bet",
                &game.max_bet.to_string(),
                "Maximum payout overflows u64",
            ));
        }

        if config.accounts.authority == config.accounts.custody {
            return Err(ConfigurationError::ValidationFailed(
                "authority and custody must be distinct accounts".to_string(),
            )
            .into());
        }

        if config.storage.data_directory.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_directory".to_string()).into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &DiceConfig, path: &str) -> DiceResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> DiceResult<T> {
    value.parse().map_err(|_| {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: "Could not parse value".to_string(),
        }
        .into()
    })
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::errors::DiceError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Builder pattern for creating configurations
#[derive(Default)]
pub struct ConfigBuilder {
    config: DiceConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    pub fn authority(mut self, authority: AccountId) -> Self {
        self.config.accounts.authority = authority;
        self
    }

    pub fn custody(mut self, custody: AccountId) -> Self {
        self.config.accounts.custody = custody;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn randomness(mut self, mode: RandomnessMode) -> Self {
        self.config.randomness.mode = mode;
        self
    }

    pub fn build(self) -> DiceConfig {
        self.config
    }
}

/// Write a default configuration file
pub fn generate_sample_config(path: &str) -> DiceResult<()> {
    ConfigLoader::new().save(&DiceConfig::default(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DiceError;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = DiceConfig::default();
        assert_eq!(config.game.min_bet, 1_000_000);
        assert_eq!(config.game.max_bet, 100_000_000);
        assert_eq!(config.game.house_edge_bps, 300);
        assert_eq!(config.game.payout_multiplier, 6);
        assert_eq!(config.randomness.mode, RandomnessMode::Public);
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let loader = ConfigLoader::new();

        let mut config = DiceConfig::default();
        config.game.min_bet = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = DiceConfig::default();
        config.game.max_bet = config.game.min_bet - 1;
        assert!(loader.validate(&config).is_err());

        let mut config = DiceConfig::default();
        config.game.house_edge_bps = 10_000;
        assert!(loader.validate(&config).is_err());

        let mut config = DiceConfig::default();
        config.accounts.custody = config.accounts.authority;
        match loader.validate(&config) {
            Err(DiceError::Configuration(ConfigurationError::ValidationFailed(_))) => {}
            other => panic!("Expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_config_builder() {
        let authority = AccountId::new([9u8; 32]);
        let config = ConfigBuilder::new()
            .authority(authority)
            .randomness(RandomnessMode::Vrf)
            .build();

        assert_eq!(config.accounts.authority, authority);
        assert_eq!(config.randomness.mode, RandomnessMode::Vrf);
    }

    #[test]
    fn test_save_and_load_config() -> DiceResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let original = ConfigBuilder::new().randomness(RandomnessMode::CommitReveal).build();
        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load_from_file(path)?;
        assert_eq!(loaded.game, original.game);
        assert_eq!(loaded.accounts, original.accounts);
        assert_eq!(loaded.randomness.mode, RandomnessMode::CommitReveal);

        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DiceConfig = toml::from_str(
            r#"
            [randomness]
            mode = "vrf"
            "#,
        )
        .unwrap();

        assert_eq!(config.randomness.mode, RandomnessMode::Vrf);
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn test_randomness_mode_parsing() {
        assert_eq!("commit-reveal".parse::<RandomnessMode>(), Ok(RandomnessMode::CommitReveal));
        assert!("oracle".parse::<RandomnessMode>().is_err());
    }
}
