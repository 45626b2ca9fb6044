//! The 128-bit root secret behind every derived key.

use rand::RngCore;
use zeroize::Zeroize;

use crate::SEED_SIZE;

/// A 16-byte seed. Zeroized on drop to prevent secrets lingering in memory.
///
/// Copies still exist wherever the caller moved or cloned it; the seed is
/// meant to live only as long as a single derivation or encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed {
    bytes: [u8; SEED_SIZE],
}

impl Seed {
    /// Generate a new seed from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; SEED_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a seed from a slice that must be exactly 16 bytes long.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, InvalidSeedLength> {
        let bytes: [u8; SEED_SIZE] = bytes
            .try_into()
            .map_err(|_| InvalidSeedLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.bytes
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("seed must be exactly {SEED_SIZE} bytes, got {0}")]
pub struct InvalidSeedLength(pub usize);
