use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::env;

/// Environment variable overriding the proof-of-work difficulty
pub const DIFFICULTY_ENV: &str = "LEDGER_DIFFICULTY";

/// Environment variable overriding the mining reward
pub const MINING_REWARD_ENV: &str = "LEDGER_MINING_REWARD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Ledger parameters fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of leading zero hex characters a mined block hash needs
    pub difficulty: usize,

    /// Amount minted to the miner of each block
    pub mining_reward: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: 2,
            mining_reward: 100.0,
        }
    }
}

impl LedgerConfig {
    /// Defaults overlaid with `LEDGER_DIFFICULTY` and `LEDGER_MINING_REWARD`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(value) = lookup(DIFFICULTY_ENV) {
            config.difficulty = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: DIFFICULTY_ENV.to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(MINING_REWARD_ENV) {
            config.mining_reward = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|reward| reward.is_finite() && *reward >= 0.0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: MINING_REWARD_ENV.to_string(),
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }
}
