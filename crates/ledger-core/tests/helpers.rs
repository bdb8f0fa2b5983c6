use ledger_core::{Chain, ChainConfig, KeyPair, Transaction};

pub fn chain_with_difficulty(difficulty: u32) -> Chain {
    Chain::with_config(ChainConfig::default().with_difficulty(difficulty))
        .expect("valid test config")
}

pub fn signed_transfer(from: &KeyPair, to: &KeyPair, amount: u64) -> Transaction {
    Transaction::new(from.public_key_hex(), to.public_key_hex(), amount).sign(from.secret_key())
}
