pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 3;
pub const BLOCK_REWARD: u64 = 100;
pub const INITIAL_NONCE: u64 = 1;
pub const GENESIS_DATA: &str = "Genesis Block";
/// Sender value that marks a protocol-issued reward.
pub const REWARD_SENDER: &str = "";
/// Attempts between cancellation checks in the sequential search.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;
