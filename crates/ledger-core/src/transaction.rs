use crate::constants::REWARD_SENDER;
use crate::crypto;
use crate::error::TransactionError;
use crate::{put_prefixed, sha256, Hash};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

/// A value transfer between two public-key identities.
///
/// An empty `sender` marks a reward issued by the chain itself; those are
/// exempt from signature checks. Fields are fixed once built: the `with_*`
/// helpers return a new value and keep whatever signature was already attached,
/// so changing a signed transaction makes it fail verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            signature: None,
        }
    }

    pub fn reward(recipient: impl Into<String>, amount: u64) -> Self {
        Self::new(REWARD_SENDER, recipient, amount)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Hex compact ECDSA signature, if signed.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    pub fn with_sender(self, sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            ..self
        }
    }

    pub fn with_recipient(self, recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            ..self
        }
    }

    pub fn with_amount(self, amount: u64) -> Self {
        Self { amount, ..self }
    }

    /// Replaces the signature verbatim. Used when a signature travels separately
    /// from the transfer fields.
    pub fn with_signature(self, signature: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            ..self
        }
    }

    /// Canonical encoding of the signed fields: sender, recipient, amount.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.sender.len() + 8 + self.recipient.len() + 8);
        put_prefixed(&mut bytes, self.sender.as_bytes());
        put_prefixed(&mut bytes, self.recipient.as_bytes());
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes
    }

    /// Digest that gets signed. Identical for identical field values in any process.
    pub fn fingerprint(&self) -> Hash {
        sha256(&self.canonical_bytes())
    }

    /// Encoding used when the transaction is committed into a block; unlike
    /// the fingerprint it also covers the signature.
    pub(crate) fn leaf_bytes(&self) -> Vec<u8> {
        let mut bytes = self.canonical_bytes();
        put_prefixed(
            &mut bytes,
            self.signature.as_deref().unwrap_or_default().as_bytes(),
        );
        bytes
    }

    /// Signs the fingerprint with `secret_key`. The key must belong to `sender`,
    /// otherwise the result fails verification.
    pub fn sign(self, secret_key: &SecretKey) -> Self {
        let signature = crypto::sign_digest(secret_key, &self.fingerprint());
        self.with_signature(hex::encode(signature))
    }

    pub fn verify(&self) -> Result<(), TransactionError> {
        if self.is_reward() {
            return Ok(());
        }
        if self.recipient.is_empty() {
            return Err(TransactionError::EmptyRecipient);
        }
        let signature = self
            .signature
            .as_deref()
            .ok_or(TransactionError::MissingSignature)?;
        crypto::verify_digest(&self.sender, &self.fingerprint(), signature)
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{to_hex, KeyPair};

    fn signed_transfer(amount: u64) -> (KeyPair, KeyPair, Transaction) {
        let sender = KeyPair::generate();
        let receiver = KeyPair::generate();
        let tx = Transaction::new(sender.public_key_hex(), receiver.public_key_hex(), amount)
            .sign(sender.secret_key());
        (sender, receiver, tx)
    }

    #[test]
    fn fingerprint_is_stable_across_processes() {
        let tx = Transaction::new("alice", "bob", 10);
        assert_eq!(tx.canonical_bytes().len(), 8 + 5 + 8 + 3 + 8);
        assert_eq!(
            to_hex(&tx.fingerprint()),
            "e35c5987e5d0ccce255c357fa7375da4eafc34107a0c8b8477467752a1e88f01"
        );
    }

    #[test]
    fn fingerprint_ignores_signature() {
        let (_, _, tx) = signed_transfer(7);
        let unsigned = Transaction::new(tx.sender(), tx.recipient(), tx.amount());
        assert_eq!(tx.fingerprint(), unsigned.fingerprint());
    }

    #[test]
    fn signed_transaction_is_valid() {
        let (_, _, tx) = signed_transfer(25);
        assert!(tx.signature().is_some());
        assert_eq!(tx.verify(), Ok(()));
        assert!(tx.is_valid());
    }

    #[test]
    fn changing_any_field_after_signing_invalidates() {
        let (_, receiver, tx) = signed_transfer(25);
        let intruder = KeyPair::generate();

        assert_eq!(
            tx.clone().with_amount(26).verify(),
            Err(TransactionError::BadSignature)
        );
        assert_eq!(
            tx.clone().with_recipient(intruder.public_key_hex()).verify(),
            Err(TransactionError::BadSignature)
        );
        assert_eq!(
            tx.clone().with_sender(intruder.public_key_hex()).verify(),
            Err(TransactionError::BadSignature)
        );
        // unchanged value still verifies
        assert!(tx.with_recipient(receiver.public_key_hex()).is_valid());
    }

    #[test]
    fn resigning_after_change_restores_validity() {
        let (sender, _, tx) = signed_transfer(25);
        let bumped = tx.with_amount(30).sign(sender.secret_key());
        assert!(bumped.is_valid());
        assert_eq!(bumped.amount(), 30);
    }

    #[test]
    fn wrong_key_signature_is_rejected() {
        let sender = KeyPair::generate();
        let forger = KeyPair::generate();
        let tx = Transaction::new(sender.public_key_hex(), "bob", 5).sign(forger.secret_key());
        assert_eq!(tx.verify(), Err(TransactionError::BadSignature));
        assert!(!tx.is_valid());
    }

    #[test]
    fn unsigned_transfer_is_invalid() {
        let sender = KeyPair::generate();
        let tx = Transaction::new(sender.public_key_hex(), "bob", 5);
        assert_eq!(tx.verify(), Err(TransactionError::MissingSignature));
    }

    #[test]
    fn malformed_signature_is_invalid_not_a_panic() {
        let sender = KeyPair::generate();
        let tx = Transaction::new(sender.public_key_hex(), "bob", 5).with_signature("xyz");
        assert!(matches!(
            tx.verify(),
            Err(TransactionError::MalformedSignature(_))
        ));
    }

    #[test]
    fn non_key_sender_is_invalid() {
        let keys = KeyPair::generate();
        let tx = Transaction::new("alice", "bob", 5).sign(keys.secret_key());
        assert!(matches!(
            tx.verify(),
            Err(TransactionError::MalformedSender(_))
        ));
    }

    #[test]
    fn empty_recipient_is_invalid() {
        let sender = KeyPair::generate();
        let tx = Transaction::new(sender.public_key_hex(), "", 5).sign(sender.secret_key());
        assert_eq!(tx.verify(), Err(TransactionError::EmptyRecipient));
    }

    #[test]
    fn reward_is_valid_regardless_of_signature() {
        let reward = Transaction::reward("miner", 100);
        assert!(reward.is_reward());
        assert!(reward.is_valid());
        assert!(reward.clone().with_signature("garbage").is_valid());
        assert!(reward.with_amount(1_000_000).is_valid());
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("alice", "bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"alice","recipient":"bob","amount":10}"#);

        let (_, _, signed) = signed_transfer(3);
        let back: Transaction = serde_json::from_str(&serde_json::to_string(&signed).unwrap()).unwrap();
        assert_eq!(back, signed);
        assert!(back.is_valid());
    }
}
