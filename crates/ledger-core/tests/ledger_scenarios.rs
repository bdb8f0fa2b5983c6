mod helpers;

use helpers::{chain_with_difficulty, signed_transfer};
use ledger_core::{
    Chain, ChainConfig, ChainError, KeyPair, MiningStrategy, SharedChain, Transaction,
    TransactionError, ValidationError,
};

#[test]
fn two_transfers_and_a_reward_in_one_round() -> anyhow::Result<()> {
    let mut chain = chain_with_difficulty(3);
    let sender = KeyPair::generate();
    let receiver = KeyPair::generate();

    let first = signed_transfer(&sender, &receiver, 10);
    let second = signed_transfer(&sender, &receiver, 20);
    assert!(first.is_valid() && second.is_valid());
    chain.append_transaction(first.clone())?;
    chain.append_transaction(second.clone())?;

    let block = chain.mine_round("minerAddr")?.clone();

    assert_eq!(chain.blocks().len(), 2);
    assert_eq!(block.transactions().len(), 3);
    assert_eq!(block.transactions()[0], first);
    assert_eq!(block.transactions()[1], second);
    let reward = &block.transactions()[2];
    assert_eq!(reward.sender(), "");
    assert_eq!(reward.recipient(), "minerAddr");
    assert_eq!(reward.amount(), ChainConfig::default().reward_amount);
    assert!(block.hash_hex().unwrap_or_default().starts_with("000"));
    assert_eq!(block.hash(), Some(&block.fingerprint()));
    assert_eq!(chain.validate_chain(), Ok(()));
    Ok(())
}

#[test]
fn wrong_key_signature_is_rejected_at_admission() {
    let mut chain = chain_with_difficulty(3);
    let sender = KeyPair::generate();
    let impostor = KeyPair::generate();
    let receiver = KeyPair::generate();

    let tx = Transaction::new(sender.public_key_hex(), receiver.public_key_hex(), 5)
        .sign(impostor.secret_key());
    assert_eq!(
        chain.append_transaction(tx),
        Err(ChainError::InvalidTransaction(TransactionError::BadSignature))
    );
    assert!(chain.pending().is_empty());
}

#[test]
fn retroactive_edits_are_reported_with_position() -> anyhow::Result<()> {
    let mut chain = chain_with_difficulty(2);
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    for amount in [1, 2, 3] {
        chain.append_transaction(signed_transfer(&alice, &bob, amount))?;
        chain.mine_round("miner")?;
    }
    assert_eq!(chain.validate_chain(), Ok(()));
    let config = chain.config().clone();
    let pristine = chain.into_blocks();

    // Editing a signed amount breaks that transaction's signature.
    let mut blocks = pristine.clone();
    let mut txs = blocks[2].transactions().to_vec();
    txs[0] = txs[0].clone().with_amount(200);
    blocks[2] = blocks[2].clone().with_transactions(txs);
    let edited = Chain::from_blocks(config.clone(), blocks)?;
    assert!(matches!(
        edited.validate_chain(),
        Err(ValidationError::InvalidTransaction {
            block: 2,
            transaction: 0,
            ..
        })
    ));

    // Editing the unsigned reward only shows up as a hash mismatch.
    let mut blocks = pristine.clone();
    let mut txs = blocks[3].transactions().to_vec();
    txs[1] = txs[1].clone().with_amount(1_000_000);
    blocks[3] = blocks[3].clone().with_transactions(txs);
    let edited = Chain::from_blocks(config.clone(), blocks)?;
    assert_eq!(
        edited.validate_chain(),
        Err(ValidationError::TamperedBlock { block: 3 })
    );

    // Pointing a block at the wrong parent breaks the link.
    let mut blocks = pristine;
    blocks[1] = blocks[1].clone().with_previous_hash(Some([0x11; 32]));
    let edited = Chain::from_blocks(config, blocks)?;
    assert_eq!(
        edited.validate_chain(),
        Err(ValidationError::BrokenLink {
            block: 1,
            previous: 0
        })
    );
    Ok(())
}

#[test]
fn parallel_strategy_builds_a_valid_chain() -> anyhow::Result<()> {
    let config = ChainConfig::default()
        .with_difficulty(3)
        .with_strategy(MiningStrategy::Parallel);
    let mut chain = Chain::with_config(config)?;
    chain.mine_round("miner")?;
    chain.mine_round("miner")?;
    assert_eq!(chain.height(), 2);
    assert!(chain.last_block().hash_hex().unwrap_or_default().starts_with("000"));
    assert_eq!(chain.validate_chain(), Ok(()));
    Ok(())
}

#[tokio::test]
async fn concurrent_producers_while_mining() -> anyhow::Result<()> {
    let chain = SharedChain::new(chain_with_difficulty(3));
    let receiver = KeyPair::generate();

    let mut producers = Vec::new();
    for _ in 0..4 {
        let chain = chain.clone();
        let to = receiver.public_key_hex();
        producers.push(tokio::task::spawn_blocking(move || {
            let keys = KeyPair::generate();
            for amount in 1..=5 {
                let tx = Transaction::new(keys.public_key_hex(), to.clone(), amount)
                    .sign(keys.secret_key());
                chain.append_transaction(tx)?;
            }
            Ok::<_, ChainError>(())
        }));
    }

    let miner = chain.clone();
    let mining = tokio::task::spawn_blocking(move || miner.mine_round("miner"));

    for producer in producers {
        producer.await??;
    }
    let first = mining.await??;

    // Whatever the round did not snapshot is still pending; mine it now.
    let leftover = chain.read().pending().len();
    let second = chain.mine_round("miner")?;

    let included = (first.transactions().len() - 1) + (second.transactions().len() - 1);
    assert_eq!(second.transactions().len() - 1, leftover);
    assert_eq!(included, 20);
    assert!(chain.read().pending().is_empty());
    assert_eq!(chain.validate_chain(), Ok(()));
    Ok(())
}
