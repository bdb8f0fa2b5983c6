use crate::constants::{GENESIS_DATA, INITIAL_NONCE};
use crate::error::{MiningError, TransactionError};
use crate::pow::{self, CancelToken};
use crate::transaction::Transaction;
use crate::{block_data_hash, merkle_root, now_millis, sha256, to_hex, Hash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    /// `None` only for genesis.
    pub previous_hash: Option<Hash>,
    pub timestamp: u64,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn new(index: u64, previous_hash: Option<Hash>) -> Self {
        Self {
            index,
            previous_hash,
            timestamp: now_millis(),
            nonce: INITIAL_NONCE,
        }
    }

    pub fn hash_bytes(&self, payload_root: &Hash) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 1 + 32 + 32 + 8 + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        match &self.previous_hash {
            Some(prev) => {
                bytes.push(1);
                bytes.extend_from_slice(prev);
            }
            None => bytes.push(0),
        }
        bytes.extend_from_slice(payload_root);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    pub fn hash_with(&self, payload_root: &Hash) -> Hash {
        sha256(&self.hash_bytes(payload_root))
    }
}

/// An ordered batch of transactions linked to its predecessor.
///
/// `hash` stays `None` until the block is sealed, either by mining or, for
/// genesis, on construction. Sealed blocks cannot be edited in place; the
/// `with_*` helpers build a new value that keeps the old hash, which is how a
/// retroactive edit shows up during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    txs: Vec<Transaction>,
    hash: Option<Hash>,
}

impl Block {
    /// An unsealed block awaiting proof-of-work.
    pub fn new(index: u64, txs: Vec<Transaction>, previous_hash: Hash) -> Self {
        Self {
            header: BlockHeader::new(index, Some(previous_hash)),
            data: None,
            txs,
            hash: None,
        }
    }

    /// The root block: placeholder payload, no transactions, sealed without a search.
    pub fn genesis() -> Self {
        let block = Self {
            header: BlockHeader::new(0, None),
            data: Some(GENESIS_DATA.to_string()),
            txs: vec![],
            hash: None,
        };
        let hash = block.fingerprint();
        Self {
            hash: Some(hash),
            ..block
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn index(&self) -> u64 {
        self.header.index
    }

    pub fn previous_hash(&self) -> Option<&Hash> {
        self.header.previous_hash.as_ref()
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn hash(&self) -> Option<&Hash> {
        self.hash.as_ref()
    }

    pub fn hash_hex(&self) -> Option<String> {
        self.hash.as_ref().map(to_hex)
    }

    pub fn is_sealed(&self) -> bool {
        self.hash.is_some()
    }

    /// Commits the transactions (in order) and the data payload into one digest.
    pub fn payload_root(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(merkle_root(&self.txs));
        hasher.update(block_data_hash(&self.data));
        hasher.finalize().into()
    }

    /// Fresh digest over the block's current fields.
    pub fn fingerprint(&self) -> Hash {
        self.header.hash_with(&self.payload_root())
    }

    pub fn first_invalid_transaction(&self) -> Option<(usize, TransactionError)> {
        self.txs
            .iter()
            .enumerate()
            .find_map(|(i, tx)| tx.verify().err().map(|e| (i, e)))
    }

    pub fn validate_transactions(&self) -> bool {
        self.first_invalid_transaction().is_none()
    }

    /// Sequential proof-of-work search; see [`pow::mine_sequential`].
    pub fn mine(self, difficulty: u32) -> Result<Block, MiningError> {
        pow::mine_sequential(self, difficulty, &CancelToken::new())
    }

    pub fn with_transactions(self, txs: Vec<Transaction>) -> Self {
        Self { txs, ..self }
    }

    pub fn with_previous_hash(self, previous_hash: Option<Hash>) -> Self {
        Self {
            header: BlockHeader {
                previous_hash,
                ..self.header
            },
            ..self
        }
    }

    pub fn with_data(self, data: Option<String>) -> Self {
        Self { data, ..self }
    }

    pub(crate) fn seal(self, header: BlockHeader, hash: Hash) -> Self {
        Self {
            header,
            hash: Some(hash),
            ..self
        }
    }
}
