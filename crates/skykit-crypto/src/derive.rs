//! Deterministic key derivation: seed + salt → signing keys and lookup key
//!
//! ```text
//! Seed (128-bit, from phrase)
//!   ├── Signing Keys  (Ed25519 from BLAKE3-KDF, context=DOMAIN_SIGNING, input=salt||seed)
//!   └── Lookup Key    (BLAKE3-KDF, context=DOMAIN_LOOKUP, input=salt||seed)
//! ```
//!
//! Nothing here is random and nothing is persisted: the same phrase and salt
//! always reproduce the same registry slot, so a memorized phrase is enough
//! to recover a stable address.

use zeroize::Zeroize;

use crate::keys::{LookupKey, SigningKeys};
use crate::seed::Seed;
use crate::KEY_SIZE;

/// BLAKE3 context for the Ed25519 signing key.
pub const DOMAIN_SIGNING: &str = "skykit 2024-06-01 registry signing key";

/// BLAKE3 context for the registry lookup key.
pub const DOMAIN_LOOKUP: &str = "skykit 2024-06-01 registry lookup key";

/// Derive 32 bytes bound to `domain`, `salt` and `seed`.
///
/// The seed has a fixed length and comes last, so distinct salts can never
/// produce the same key material.
pub fn derive(seed: &Seed, salt: &str, domain: &str) -> [u8; KEY_SIZE] {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    hasher.update(salt.as_bytes());
    hasher.update(seed.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Ed25519 keypair for signing registry entries under `salt`.
pub fn derive_key_pair(seed: &Seed, salt: &str) -> SigningKeys {
    let mut entropy = derive(seed, salt, DOMAIN_SIGNING);
    let keys = SigningKeys::from_entropy(&entropy);
    entropy.zeroize();
    keys
}

/// Lookup key naming the registry slot for `salt`.
pub fn derive_lookup_key(seed: &Seed, salt: &str) -> LookupKey {
    LookupKey::from_bytes(derive(seed, salt, DOMAIN_LOOKUP))
}

/// Both derived values for one (seed, salt) pair.
pub fn derive_keys(seed: &Seed, salt: &str) -> (SigningKeys, LookupKey) {
    (derive_key_pair(seed, salt), derive_lookup_key(seed, salt))
}
