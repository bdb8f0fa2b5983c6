//! secp256k1 keys and ECDSA over 32-byte digests.

use crate::error::{KeyError, TransactionError};
use crate::Hash;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};

/// Shared signing and verification context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

#[derive(Debug, Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::new(&mut OsRng))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret_hex.trim())?;
        let secret_key = SecretKey::from_slice(&bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Compressed SEC1 public key as hex; this is the identity used as a sender.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

pub fn sign_digest(secret_key: &SecretKey, digest: &Hash) -> [u8; COMPACT_SIGNATURE_SIZE] {
    let message = Message::from_digest(*digest);
    SECP256K1_CONTEXT
        .sign_ecdsa(&message, secret_key)
        .serialize_compact()
}

/// Verifies a hex compact signature over `digest` under a hex compressed public key.
pub fn verify_digest(
    public_key_hex: &str,
    digest: &Hash,
    signature_hex: &str,
) -> Result<(), TransactionError> {
    let key_bytes =
        hex::decode(public_key_hex).map_err(|e| TransactionError::MalformedSender(e.to_string()))?;
    if key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(TransactionError::MalformedSender(format!(
            "expected {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            key_bytes.len()
        )));
    }
    let public_key = PublicKey::from_slice(&key_bytes)
        .map_err(|e| TransactionError::MalformedSender(e.to_string()))?;

    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| TransactionError::MalformedSignature(e.to_string()))?;
    if sig_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(TransactionError::MalformedSignature(format!(
            "expected {} bytes, got {}",
            COMPACT_SIGNATURE_SIZE,
            sig_bytes.len()
        )));
    }
    let signature = Signature::from_compact(&sig_bytes)
        .map_err(|e| TransactionError::MalformedSignature(e.to_string()))?;

    let message = Message::from_digest(*digest);
    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| TransactionError::BadSignature)
}
