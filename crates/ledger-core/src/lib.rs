use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod mine;
pub mod shared;
pub mod transaction;

pub use block::{Block, BlockHeader};
pub use chain::{BlockTemplate, Chain};
pub use config::{ChainConfig, MiningStrategy};
pub use crypto::KeyPair;
pub use error::{ChainError, KeyError, MiningError, TransactionError, ValidationError};
pub use mine::MiningJob;
pub use shared::{PendingRound, SharedChain};
pub use transaction::Transaction;

pub type Hash = [u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Lowercase hex rendering of a digest, the form difficulty is expressed in.
pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Appends `bytes` prefixed with its length so adjacent fields cannot bleed into each other.
pub(crate) fn put_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Digest of the opaque payload carried by the genesis block. Zeroed when absent.
pub fn block_data_hash(data: &Option<String>) -> Hash {
    match data {
        Some(data) => sha256(data.as_bytes()),
        None => [0u8; 32],
    }
}

pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = txs.iter().map(|t| sha256(&t.leaf_bytes())).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            // An odd node out is paired with itself.
            let right = pair.get(1).unwrap_or(&pair[0]);
            let mut joined = [0u8; 64];
            joined[..32].copy_from_slice(&pair[0]);
            joined[32..].copy_from_slice(right);
            next.push(sha256(&joined));
        }
        level = next;
    }
    level[0]
}

pub mod pow {
    use super::{now_millis, Block, Hash};
    use crate::constants::{CANCEL_CHECK_INTERVAL, HASH_HEX_SIZE};
    use crate::error::MiningError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tracing::debug;

    /// Shared flag a caller flips to stop an in-flight search.
    #[derive(Clone, Debug, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        match hash.iter().position(|b| *b != 0) {
            Some(i) => i as u32 * 8 + hash[i].leading_zeros(),
            None => (hash.len() * 8) as u32,
        }
    }

    /// Number of leading `'0'` characters in the hex form of `hash`.
    pub fn leading_zero_digits(hash: &Hash) -> u32 {
        count_leading_zero_bits(hash) / 4
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        leading_zero_digits(hash) >= difficulty
    }

    /// Rejects searches that must not start: a difficulty no digest can meet,
    /// an already sealed block, or one carrying a transaction that fails verification.
    pub(crate) fn check_minable(block: &Block, difficulty: u32) -> Result<(), MiningError> {
        if difficulty as usize > HASH_HEX_SIZE {
            return Err(MiningError::InvalidDifficulty(difficulty));
        }
        if block.is_sealed() {
            return Err(MiningError::AlreadySealed);
        }
        if let Some((index, source)) = block.first_invalid_transaction() {
            return Err(MiningError::TamperedInput { index, source });
        }
        Ok(())
    }

    /// Seal the block by refreshing the timestamp and incrementing the nonce until
    /// the hex digest has at least `difficulty` leading zeros.
    ///
    /// The nonce stored in the returned block is always the one that produced its hash.
    pub fn mine_sequential(
        block: Block,
        difficulty: u32,
        cancel: &CancelToken,
    ) -> Result<Block, MiningError> {
        check_minable(&block, difficulty)?;
        if cancel.is_cancelled() {
            return Err(MiningError::Aborted);
        }

        let root = block.payload_root();
        let mut header = *block.header();
        let mut hash = header.hash_with(&root);
        let mut attempts = 0u64;

        while !meets_difficulty(&hash, difficulty) {
            attempts += 1;
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                debug!(index = header.index, attempts, "search cancelled");
                return Err(MiningError::Aborted);
            }
            header.timestamp = now_millis();
            header.nonce = header.nonce.wrapping_add(1);
            hash = header.hash_with(&root);
        }

        debug!(index = header.index, nonce = header.nonce, attempts, "search finished");
        Ok(block.seal(header, hash))
    }
}
