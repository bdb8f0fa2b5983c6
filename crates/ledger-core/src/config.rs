use crate::constants::{BLOCK_REWARD, DEFAULT_DIFFICULTY, HASH_HEX_SIZE};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};

/// How the proof-of-work search is run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStrategy {
    /// One thread, timestamp refreshed on every attempt.
    #[default]
    Sequential,
    /// Nonce range split across the rayon pool with a fixed timestamp.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading `'0'` hex digits required of a mined block hash.
    pub difficulty: u32,
    /// Credited to the reward address on every mining round.
    pub reward_amount: u64,
    pub strategy: MiningStrategy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            reward_amount: BLOCK_REWARD,
            strategy: MiningStrategy::Sequential,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_reward(mut self, reward_amount: u64) -> Self {
        self.reward_amount = reward_amount;
        self
    }

    pub fn with_strategy(mut self, strategy: MiningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(ChainError::InvalidDifficulty(self.difficulty));
        }
        Ok(())
    }
}
