//! Key material types: Ed25519 signing keys, public keys, and lookup keys

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use std::str::FromStr;

use crate::KEY_SIZE;

pub use ed25519_dalek::Signature;

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Prefix used in the textual form of a public key
const ED25519_PREFIX: &str = "ed25519:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid lookup key: {0}")]
    InvalidLookupKey(String),

    #[error("signature does not verify under the public key")]
    BadSignature,
}

/// An Ed25519 signing keypair. The secret half is zeroized on drop.
#[derive(Clone)]
pub struct SigningKeys {
    signing: SigningKey,
}

impl SigningKeys {
    /// Deterministic keypair from 32 bytes of entropy.
    pub fn from_entropy(entropy: &[u8; KEY_SIZE]) -> Self {
        Self {
            signing: SigningKey::from_bytes(entropy),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("public_key", &self.public_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// An Ed25519 public key, displayed as `ed25519:<hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), KeyError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        key.verify(message, signature)
            .map_err(|_| KeyError::BadSignature)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    /// Accepts `ed25519:<hex>` or bare hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix(ED25519_PREFIX).unwrap_or(s);
        decode_key(hex_part)
            .map(Self)
            .map_err(KeyError::InvalidPublicKey)
    }
}

/// Identifies one registry slot under a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey([u8; KEY_SIZE]);

impl LookupKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LookupKey({self})")
    }
}

impl FromStr for LookupKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_key(s).map(Self).map_err(KeyError::InvalidLookupKey)
    }
}

fn decode_key(s: &str) -> Result<[u8; KEY_SIZE], String> {
    let bytes = hex::decode(s).map_err(|e| format!("hex decode: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {KEY_SIZE} bytes, got {}", b.len()))
}
