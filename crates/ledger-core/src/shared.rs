use crate::chain::Chain;
use crate::error::{ChainError, ValidationError};
use crate::mine::MiningJob;
use crate::pow::CancelToken;
use crate::{Block, Transaction};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::{info, warn};

/// A [`Chain`] behind a lock, for producers and readers on several threads.
///
/// Mining runs outside the lock on a snapshot of the pool; only the final
/// append takes the write lock, so readers never see a half-applied round.
#[derive(Clone, Default)]
pub struct SharedChain {
    inner: Arc<RwLock<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.inner.read()
    }

    pub fn append_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        self.inner.write().append_transaction(tx)
    }

    pub fn validate_chain(&self) -> Result<(), ValidationError> {
        self.inner.read().validate_chain()
    }

    /// Snapshots the pool and starts the proof-of-work search in the background.
    pub fn start_round(&self, reward_address: &str) -> Result<PendingRound, ChainError> {
        let (template, difficulty, strategy) = {
            let chain = self.inner.read();
            (
                chain.prepare_round(reward_address)?,
                chain.config().difficulty,
                chain.config().strategy,
            )
        };
        let (block, drained) = template.into_parts();
        info!(
            index = block.index(),
            txs = block.transactions().len(),
            difficulty,
            "starting mining round"
        );
        Ok(PendingRound {
            chain: self.clone(),
            job: MiningJob::spawn(block, difficulty, strategy),
            drained,
        })
    }

    /// Blocking round: start, wait, commit.
    pub fn mine_round(&self, reward_address: &str) -> Result<Block, ChainError> {
        self.start_round(reward_address)?.finish()
    }
}

/// An in-flight mining round started by [`SharedChain::start_round`].
pub struct PendingRound {
    chain: SharedChain,
    job: MiningJob,
    drained: usize,
}

impl PendingRound {
    pub fn cancel_token(&self) -> CancelToken {
        self.job.cancel_token()
    }

    pub fn cancel(&self) {
        self.job.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.job.is_finished()
    }

    /// Waits for the search and appends the sealed block. A cancelled or
    /// stale round leaves the chain and its pool unchanged.
    pub fn finish(self) -> Result<Block, ChainError> {
        let sealed = match self.job.wait() {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!(error = %e, "mining round ended without a block");
                return Err(e.into());
            }
        };
        let mut chain = self.chain.inner.write();
        chain.commit_round(self.drained, sealed).cloned()
    }
}
