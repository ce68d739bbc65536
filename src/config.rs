//! Configuration file support for the Cinder node.
//!
//! Loads an optional TOML file passed via `--config`. Missing keys fall back
//! to defaults; an unreadable or invalid file aborts startup. The parsed
//! value is immutable and threaded through constructors rather than held in
//! a global.

use std::path::Path;

use serde::Deserialize;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level chain configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Whether blocks must meet a proof-of-work target.
    pub proof_of_work: bool,
    pub block_gen: BlockGenConfig,
    /// Present iff the node runs the UTXO transaction model.
    pub transaction: Option<TransactionConfig>,
}

/// Block generation section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BlockGenConfig {
    /// Interval after which a new block should be mined, in milliseconds.
    pub interval: u64,
    /// Initial block generation difficulty.
    pub difficulty_init: f64,
    /// Number of blocks after which the difficulty is adjusted.
    pub difficulty_adjust_after: u64,
    /// Limit on a single difficulty adjustment factor.
    pub difficulty_adjust_factor_limit: f64,
    /// Tolerated clock skew for block timestamps, in milliseconds.
    pub time_max_delta: u64,
}

impl Default for BlockGenConfig {
    fn default() -> Self {
        BlockGenConfig {
            interval: 10_000,
            difficulty_init: 2.0,
            difficulty_adjust_after: 10,
            difficulty_adjust_factor_limit: 16.0,
            time_max_delta: 60_000,
        }
    }
}

/// Transaction section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Maximum number of standard transactions per block.
    pub num_per_block: usize,
    /// Amount minted by the reward transaction of each block.
    pub reward_amount: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            num_per_block: 10,
            reward_amount: 10,
        }
    }
}

impl ChainConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ChainConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Reject values the difficulty controller and validators cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_gen.interval == 0 {
            return Err(ConfigError::Invalid("block_gen.interval must be > 0".into()));
        }
        if self.block_gen.difficulty_init < 1.0 {
            return Err(ConfigError::Invalid(
                "block_gen.difficulty_init must be >= 1".into(),
            ));
        }
        if self.block_gen.difficulty_adjust_after == 0 {
            return Err(ConfigError::Invalid(
                "block_gen.difficulty_adjust_after must be > 0".into(),
            ));
        }
        if self.block_gen.difficulty_adjust_factor_limit < 1.0 {
            return Err(ConfigError::Invalid(
                "block_gen.difficulty_adjust_factor_limit must be >= 1".into(),
            ));
        }
        if let Some(transaction) = &self.transaction {
            if transaction.num_per_block == 0 {
                return Err(ConfigError::Invalid(
                    "transaction.num_per_block must be > 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the node runs the UTXO transaction model.
    pub fn transactions_enabled(&self) -> bool {
        self.transaction.is_some()
    }
}
