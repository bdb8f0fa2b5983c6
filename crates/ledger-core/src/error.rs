/// Why a transaction failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("transaction is not signed")]
    MissingSignature,

    #[error("transaction has an empty recipient")]
    EmptyRecipient,

    #[error("sender is not a valid public key: {0}")]
    MalformedSender(String),

    #[error("signature is malformed: {0}")]
    MalformedSignature(String),

    #[error("signature does not verify under the sender key")]
    BadSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiningError {
    #[error("difficulty {0} exceeds the digest length")]
    InvalidDifficulty(u32),

    #[error("block is already sealed")]
    AlreadySealed,

    #[error("refusing to mine block with invalid transaction {index}: {source}")]
    TamperedInput {
        index: usize,
        source: TransactionError,
    },

    #[error("mining round was cancelled before sealing")]
    Aborted,

    #[error("nonce space exhausted without meeting the difficulty")]
    NonceSpaceExhausted,

    #[error("mining worker panicked")]
    WorkerPanicked,
}

/// First inconsistency found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("genesis block has a previous hash")]
    GenesisHasPreviousHash,

    #[error("invalid transaction {transaction} in block {block}: {source}")]
    InvalidTransaction {
        block: usize,
        transaction: usize,
        source: TransactionError,
    },

    #[error("block {block} hash does not match its contents")]
    TamperedBlock { block: usize },

    #[error("broken link: block {block} does not reference block {previous}")]
    BrokenLink { block: usize, previous: usize },

    #[error("block at position {block} claims index {found}")]
    UnexpectedIndex { block: usize, found: u64 },

    #[error("block {block} hash has {found} leading zeros, {required} required")]
    InsufficientWork {
        block: usize,
        required: u32,
        found: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    #[error("reward address is empty")]
    EmptyRewardAddress,

    #[error("a chain needs at least a genesis block")]
    EmptyChain,

    #[error("difficulty {0} exceeds the digest length")]
    InvalidDifficulty(u32),

    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error("block rejected: {0}")]
    RejectedBlock(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}
