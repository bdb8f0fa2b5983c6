use crate::config::MiningStrategy;
use crate::error::MiningError;
use crate::pow::{check_minable, meets_difficulty, mine_sequential, CancelToken};
use crate::{now_millis, to_hex, Block};
use rayon::prelude::*;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Mines a block by searching nonces in parallel until the header hash has at least
/// `difficulty` leading zero hex digits. The timestamp is fixed for the whole search;
/// the first worker to hit a qualifying nonce wins and the rest stop.
pub fn mine_parallel(
    block: Block,
    difficulty: u32,
    cancel: &CancelToken,
) -> Result<Block, MiningError> {
    check_minable(&block, difficulty)?;

    let root = block.payload_root();
    let mut base_header = *block.header();
    base_header.timestamp = now_millis();
    let start = base_header.nonce;

    // Rayon splits the range across its pool; `Some(None)` is the cancel signal.
    let found = (start..u64::MAX).into_par_iter().find_map_any(|nonce| {
        if cancel.is_cancelled() {
            return Some(None);
        }
        let mut h = base_header;
        h.nonce = nonce;
        let hash = h.hash_with(&root);
        meets_difficulty(&hash, difficulty).then_some(Some((h, hash)))
    });

    match found {
        Some(Some((header, hash))) => Ok(block.seal(header, hash)),
        Some(None) => Err(MiningError::Aborted),
        None => Err(MiningError::NonceSpaceExhausted),
    }
}

pub fn mine_with(
    strategy: MiningStrategy,
    block: Block,
    difficulty: u32,
    cancel: &CancelToken,
) -> Result<Block, MiningError> {
    let index = block.index();
    let result = match strategy {
        MiningStrategy::Sequential => mine_sequential(block, difficulty, cancel),
        MiningStrategy::Parallel => mine_parallel(block, difficulty, cancel),
    };
    match &result {
        Ok(mined) => info!(
            "Mined block {} with nonce {} and hash {}",
            index,
            mined.nonce(),
            mined.hash().map(to_hex).unwrap_or_default()
        ),
        Err(e) => warn!(index, error = %e, "mining did not seal block"),
    }
    result
}

/// A proof-of-work search running on its own thread. Dropping the job without
/// waiting on it cancels the search.
pub struct MiningJob {
    cancel: CancelToken,
    handle: Option<JoinHandle<Result<Block, MiningError>>>,
}

impl MiningJob {
    pub fn spawn(block: Block, difficulty: u32, strategy: MiningStrategy) -> Self {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || mine_with(strategy, block, difficulty, &token));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the search ends.
    pub fn wait(mut self) -> Result<Block, MiningError> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(MiningError::WorkerPanicked)),
            None => Err(MiningError::WorkerPanicked),
        }
    }
}

impl Drop for MiningJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyPair, Transaction};
    use std::time::Duration;

    fn candidate() -> Block {
        let sender = KeyPair::generate();
        let txs = vec![
            Transaction::new(sender.public_key_hex(), "bob", 10).sign(sender.secret_key()),
            Transaction::reward("miner", 100),
        ];
        Block::new(1, txs, [9u8; 32])
    }

    #[test]
    fn parallel_search_seals_block() {
        let mined = mine_parallel(candidate(), 3, &CancelToken::new()).unwrap();
        assert!(mined.hash_hex().unwrap().starts_with("000"));
        assert_eq!(mined.hash(), Some(&mined.fingerprint()));
    }

    #[test]
    fn parallel_search_rejects_forged_input() {
        let block = candidate();
        let mut txs = block.transactions().to_vec();
        txs[0] = txs[0].clone().with_amount(11);
        let forged = block.with_transactions(txs);
        assert!(matches!(
            mine_parallel(forged, 1, &CancelToken::new()),
            Err(MiningError::TamperedInput { index: 0, .. })
        ));
    }

    #[test]
    fn parallel_search_honours_cancel() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            mine_parallel(candidate(), 64, &token),
            Err(MiningError::Aborted)
        );
    }

    #[test]
    fn strategies_agree_on_the_predicate() {
        for strategy in [MiningStrategy::Sequential, MiningStrategy::Parallel] {
            let mined = mine_with(strategy, candidate(), 2, &CancelToken::new()).unwrap();
            assert!(meets_difficulty(mined.hash().unwrap(), 2));
            assert_eq!(mined.hash(), Some(&mined.fingerprint()));
        }
    }

    #[test]
    fn background_job_completes() {
        let job = MiningJob::spawn(candidate(), 2, MiningStrategy::Sequential);
        let mined = job.wait().unwrap();
        assert!(mined.hash_hex().unwrap().starts_with("00"));
    }

    #[test]
    fn background_job_can_be_cancelled() {
        for strategy in [MiningStrategy::Sequential, MiningStrategy::Parallel] {
            let job = MiningJob::spawn(candidate(), 64, strategy);
            std::thread::sleep(Duration::from_millis(20));
            assert!(!job.is_finished());
            job.cancel();
            assert_eq!(job.wait(), Err(MiningError::Aborted));
        }
    }

    #[test]
    fn dropping_a_job_stops_its_search() {
        for strategy in [MiningStrategy::Sequential, MiningStrategy::Parallel] {
            let job = MiningJob::spawn(candidate(), 64, strategy);
            let token = job.cancel_token();
            drop(job);
            assert!(token.is_cancelled());
        }
    }

    #[test]
    fn waited_job_is_not_cancelled() {
        let job = MiningJob::spawn(candidate(), 1, MiningStrategy::Sequential);
        let token = job.cancel_token();
        assert!(job.wait().is_ok());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn parallel_search_rejects_unreachable_difficulty() {
        assert_eq!(
            mine_parallel(candidate(), 65, &CancelToken::new()),
            Err(MiningError::InvalidDifficulty(65))
        );
    }
}
