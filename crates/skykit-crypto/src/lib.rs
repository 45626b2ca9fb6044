//! skykit-crypto: seed phrases and deterministic key derivation
//!
//! Pipeline: phrase → seed (MnemonicCodec) → (signing keys, lookup key) (derive)
//!
//! Key hierarchy:
//! ```text
//! Seed (128-bit, 15-word phrase with 20-bit SHA-512 checksum)
//!   └── per salt
//!       ├── Signing Keys (Ed25519, signs registry entries)
//!       └── Lookup Key   (names the registry slot)
//! ```

pub mod derive;
pub mod dictionary;
pub mod keys;
pub mod phrase;
pub mod seed;

pub use derive::{derive_key_pair, derive_keys, derive_lookup_key};
pub use dictionary::{resolve_prefix, Dictionary, ENGLISH_V1};
pub use keys::{KeyError, LookupKey, PublicKey, Signature, SigningKeys};
pub use phrase::{generate_phrase, phrase_to_seed, seed_to_phrase, MnemonicCodec, PhraseError};
pub use seed::Seed;

/// Size of a seed in bytes (128-bit)
pub const SEED_SIZE: usize = 16;

/// Size of derived keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;
