use crate::config::ChainConfig;
use crate::error::{ChainError, ValidationError};
use crate::mine::mine_with;
use crate::pow::{leading_zero_digits, CancelToken};
use crate::{Block, Transaction};
use tracing::{debug, info, warn};

/// A candidate block built from a snapshot of the pending pool.
///
/// `drained` counts how many pool entries the candidate took, so committing it
/// removes exactly those and leaves anything submitted during the search.
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    block: Block,
    drained: usize,
}

impl BlockTemplate {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn drained(&self) -> usize {
        self.drained
    }

    pub fn into_parts(self) -> (Block, usize) {
        (self.block, self.drained)
    }
}

/// The in-memory ledger: genesis at index 0, append-only blocks, and a pool of
/// admitted transactions waiting for the next round.
#[derive(Clone, Debug)]
pub struct Chain {
    config: ChainConfig,
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self {
            config: ChainConfig::default(),
            blocks: vec![Block::genesis()],
            pending: vec![],
        }
    }

    pub fn with_config(config: ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Re-assembles a chain from an existing block sequence, e.g. one loaded
    /// from elsewhere. Nothing is checked here; call [`Chain::validate_chain`].
    pub fn from_blocks(config: ChainConfig, blocks: Vec<Block>) -> Result<Self, ChainError> {
        config.validate()?;
        if blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Self {
            config,
            blocks,
            pending: vec![],
        })
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Index of the tip; 0 when only genesis exists.
    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    pub fn last_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Admits `tx` to the pool if its signature verifies.
    pub fn append_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        if let Err(e) = tx.verify() {
            warn!(sender = tx.sender(), error = %e, "rejected transaction");
            return Err(e.into());
        }
        debug!(
            sender = tx.sender(),
            recipient = tx.recipient(),
            amount = tx.amount(),
            "admitted transaction"
        );
        self.pending.push(tx);
        Ok(())
    }

    /// Snapshots the pool plus a reward for `reward_address` into an unsealed
    /// block on top of the current tip. The chain itself is not touched.
    pub fn prepare_round(&self, reward_address: &str) -> Result<BlockTemplate, ChainError> {
        if reward_address.is_empty() {
            return Err(ChainError::EmptyRewardAddress);
        }
        let tip = self.last_block();
        let previous_hash = *tip.hash().ok_or(ValidationError::TamperedBlock {
            block: self.blocks.len() - 1,
        })?;

        let mut txs = self.pending.clone();
        txs.push(Transaction::reward(reward_address, self.config.reward_amount));

        Ok(BlockTemplate {
            block: Block::new(self.blocks.len() as u64, txs, previous_hash),
            drained: self.pending.len(),
        })
    }

    /// Appends a sealed block produced from a [`BlockTemplate`] and drops the
    /// `drained` pool entries it included. A block that no longer fits the tip
    /// is rejected and leaves the chain unchanged.
    pub fn commit_round(&mut self, drained: usize, sealed: Block) -> Result<&Block, ChainError> {
        let position = self.blocks.len();
        check_successor(self.last_block(), &sealed, position, self.config.difficulty)?;

        self.blocks.push(sealed);
        self.pending.drain(..drained.min(self.pending.len()));

        let block = self.last_block();
        info!(
            index = block.index(),
            txs = block.transactions().len(),
            hash = %block.hash_hex().unwrap_or_default(),
            "appended block"
        );
        Ok(block)
    }

    /// Runs a full round: reward, candidate block, proof-of-work, append.
    /// On any failure the chain and the pool are left as they were.
    pub fn mine_round(&mut self, reward_address: &str) -> Result<&Block, ChainError> {
        let (candidate, drained) = self.prepare_round(reward_address)?.into_parts();
        let sealed = mine_with(
            self.config.strategy,
            candidate,
            self.config.difficulty,
            &CancelToken::new(),
        )?;
        self.commit_round(drained, sealed)
    }

    /// True iff the stored hash equals a fresh fingerprint.
    pub fn validate_block(&self, block: &Block) -> bool {
        block_hash_matches(block)
    }

    /// Walks the whole sequence and reports the first inconsistency.
    pub fn validate_chain(&self) -> Result<(), ValidationError> {
        let genesis = &self.blocks[0];
        if genesis.previous_hash().is_some() {
            return Err(ValidationError::GenesisHasPreviousHash);
        }
        if !block_hash_matches(genesis) {
            return Err(ValidationError::TamperedBlock { block: 0 });
        }

        for (i, pair) in self.blocks.windows(2).enumerate() {
            check_successor(&pair[0], &pair[1], i + 1, self.config.difficulty)?;
        }
        Ok(())
    }
}

fn block_hash_matches(block: &Block) -> bool {
    block.hash() == Some(&block.fingerprint())
}

/// Checks `block` sitting at `position` directly after `previous`. The link is
/// checked before the hash, so a rewritten `previous_hash` reports as a broken
/// link rather than as a tampered block.
fn check_successor(
    previous: &Block,
    block: &Block,
    position: usize,
    difficulty: u32,
) -> Result<(), ValidationError> {
    if let Some((transaction, source)) = block.first_invalid_transaction() {
        return Err(ValidationError::InvalidTransaction {
            block: position,
            transaction,
            source,
        });
    }
    if previous.hash().is_none() || block.previous_hash() != previous.hash() {
        return Err(ValidationError::BrokenLink {
            block: position,
            previous: position - 1,
        });
    }
    if !block_hash_matches(block) {
        return Err(ValidationError::TamperedBlock { block: position });
    }
    if block.index() != position as u64 {
        return Err(ValidationError::UnexpectedIndex {
            block: position,
            found: block.index(),
        });
    }
    let found = block.hash().map(leading_zero_digits).unwrap_or_default();
    if found < difficulty {
        return Err(ValidationError::InsufficientWork {
            block: position,
            required: difficulty,
            found,
        });
    }
    Ok(())
}
